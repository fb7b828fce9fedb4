//! Debounced background sync.
//!
//! One worker task per signed-in session. It holds at most one pending state
//! and runs at most one sync at a time; states that arrive while a sync runs
//! replace the pending one and go out after it finishes.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::engine::sync_app_state;
use super::remote::RemoteStore;
use crate::model::state::{AppState, SyncStatus};

/// Quiet period after the last change before a sync starts
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

/// SHA-256 of a state's JSON, used to detect no-op changes
pub fn fingerprint(state: &AppState) -> String {
    let json = serde_json::to_vec(state).unwrap_or_default();
    format!("{:x}", Sha256::digest(&json))
}

struct Pending {
    state: AppState,
    fingerprint: String,
}

enum Command {
    Changed(Pending),
    Flush(oneshot::Sender<SyncStatus>),
}

/// Client side of a sync worker
pub struct SyncHandle {
    tx: Option<mpsc::UnboundedSender<Command>>,
    status: Arc<watch::Sender<SyncStatus>>,
    last_seen: Option<String>,
    worker: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Start a worker for `user_id`. `synced` is a state already known to
    /// match the remote; notifying it again does nothing.
    pub fn spawn(
        remote: Arc<dyn RemoteStore>,
        user_id: impl Into<String>,
        debounce: Duration,
        synced: Option<&AppState>,
    ) -> Self {
        let last_synced = synced.map(fingerprint);
        let initial = if last_synced.is_some() {
            SyncStatus::Synced
        } else {
            SyncStatus::Idle
        };
        let (status_tx, _) = watch::channel(initial);
        let status = Arc::new(status_tx);
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = Worker {
            remote,
            user_id: user_id.into(),
            debounce,
            status: Arc::clone(&status),
            last_synced: last_synced.clone(),
        };
        let join = tokio::spawn(worker.run(rx));

        SyncHandle {
            tx: Some(tx),
            status,
            last_seen: last_synced,
            worker: Some(join),
        }
    }

    /// A handle for local-only mode. Status is always `Offline`.
    pub fn offline() -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::Offline);
        SyncHandle {
            tx: None,
            status: Arc::new(status_tx),
            last_seen: None,
            worker: None,
        }
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Queue `state` for sync. Identical consecutive states are ignored.
    pub fn notify(&mut self, state: &AppState) {
        let Some(tx) = &self.tx else {
            return;
        };
        let fingerprint = fingerprint(state);
        if self.last_seen.as_deref() == Some(fingerprint.as_str()) {
            return;
        }
        self.last_seen = Some(fingerprint.clone());
        self.status.send_replace(SyncStatus::Syncing);
        let pending = Pending {
            state: state.clone(),
            fingerprint,
        };
        if tx.send(Command::Changed(pending)).is_err() {
            warn!("sync worker is gone; change not queued");
        }
    }

    /// Skip the rest of the quiet period and wait for the outcome
    pub async fn flush(&self) -> SyncStatus {
        let Some(tx) = &self.tx else {
            return self.status();
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(Command::Flush(done_tx)).is_err() {
            return self.status();
        }
        done_rx.await.unwrap_or_else(|_| self.status())
    }

    /// Stop the worker. A change still in its quiet period is dropped; a
    /// sync already running completes first.
    pub async fn shutdown(mut self) {
        self.tx = None;
        if let Some(worker) = self.worker.take()
            && let Err(e) = worker.await
        {
            warn!(error = %e, "sync worker panicked");
        }
    }
}

struct Worker {
    remote: Arc<dyn RemoteStore>,
    user_id: String,
    debounce: Duration,
    status: Arc<watch::Sender<SyncStatus>>,
    last_synced: Option<String>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut pending: Option<Pending> = None;
        let mut waiters: Vec<oneshot::Sender<SyncStatus>> = Vec::new();

        loop {
            if pending.is_none() {
                match rx.recv().await {
                    None => return,
                    Some(Command::Changed(p)) => {
                        self.status.send_replace(SyncStatus::Syncing);
                        pending = Some(p);
                    }
                    Some(Command::Flush(done)) => {
                        let _ = done.send(*self.status.borrow());
                        continue;
                    }
                }
            }

            // Quiet period, restarted by every change. A flush ends it early.
            let mut deadline = Instant::now() + self.debounce;
            while waiters.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    cmd = rx.recv() => match cmd {
                        None => {
                            debug!("sync handle dropped; pending change discarded");
                            return;
                        }
                        Some(Command::Changed(p)) => {
                            pending = Some(p);
                            deadline = Instant::now() + self.debounce;
                        }
                        Some(Command::Flush(done)) => waiters.push(done),
                    },
                }
            }

            let Some(next) = pending.take() else {
                continue;
            };
            let closed = if self.last_synced.as_deref() == Some(next.fingerprint.as_str()) {
                debug!("state matches last sync; skipping");
                self.status.send_replace(SyncStatus::Synced);
                self.drain(&mut rx, &mut pending, &mut waiters)
            } else {
                self.status.send_replace(SyncStatus::Syncing);
                let result = sync_app_state(self.remote.as_ref(), &self.user_id, &next.state).await;
                let closed = self.drain(&mut rx, &mut pending, &mut waiters);
                match result {
                    Ok(()) => {
                        self.last_synced = Some(next.fingerprint);
                        if pending.is_none() {
                            self.status.send_replace(SyncStatus::Synced);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, user = %self.user_id, "sync failed");
                        if pending.is_none() {
                            self.status.send_replace(SyncStatus::Error);
                        }
                    }
                }
                closed
            };

            if pending.is_none() {
                let status = *self.status.borrow();
                for done in waiters.drain(..) {
                    let _ = done.send(status);
                }
            }
            if closed {
                return;
            }
        }
    }

    /// Take whatever queued up during a sync. Returns true once the handle is gone.
    fn drain(
        &self,
        rx: &mut mpsc::UnboundedReceiver<Command>,
        pending: &mut Option<Pending>,
        waiters: &mut Vec<oneshot::Sender<SyncStatus>>,
    ) -> bool {
        loop {
            match rx.try_recv() {
                Ok(Command::Changed(p)) => *pending = Some(p),
                Ok(Command::Flush(done)) => waiters.push(done),
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => return true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::seed::default_state;
    use crate::sync::tables::MemoryRemote;
    use pretty_assertions::assert_eq;

    fn with_initials(initials: &str) -> AppState {
        let mut state = default_state();
        state.user_initials = initials.to_string();
        state
    }

    fn spawn(remote: &Arc<MemoryRemote>, synced: Option<&AppState>) -> SyncHandle {
        let remote: Arc<dyn RemoteStore> = remote.clone();
        SyncHandle::spawn(remote, "u1", DEFAULT_DEBOUNCE, synced)
    }

    fn written_initials(remote: &MemoryRemote) -> Vec<String> {
        remote
            .profile_writes()
            .into_iter()
            .filter_map(|p| p.user_initials)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_coalesce_into_one_sync() {
        let remote = Arc::new(MemoryRemote::new());
        let mut handle = spawn(&remote, None);
        assert_eq!(handle.status(), SyncStatus::Idle);

        for initials in ["AA", "BB", "CC"] {
            handle.notify(&with_initials(initials));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(handle.status(), SyncStatus::Syncing);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.status(), SyncStatus::Synced);
        assert_eq!(written_initials(&remote), vec!["CC"]);
    }

    #[tokio::test(start_paused = true)]
    async fn each_change_restarts_the_quiet_period() {
        let remote = Arc::new(MemoryRemote::new());
        let mut handle = spawn(&remote, None);

        handle.notify(&with_initials("AA"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.notify(&with_initials("BB"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(remote.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(written_initials(&remote), vec!["BB"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_state_is_not_resent() {
        let remote = Arc::new(MemoryRemote::new());
        let state = default_state();
        let mut handle = spawn(&remote, Some(&state));
        assert_eq!(handle.status(), SyncStatus::Synced);

        handle.notify(&state);
        assert_eq!(handle.status(), SyncStatus::Synced);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reverting_to_synced_state_skips_the_sync() {
        let remote = Arc::new(MemoryRemote::new());
        let state = default_state();
        let mut handle = spawn(&remote, Some(&state));

        handle.notify(&with_initials("ZZ"));
        handle.notify(&state);
        assert_eq!(handle.flush().await, SyncStatus::Synced);
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_sets_error_and_next_change_retries() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_failing(true);
        let mut handle = spawn(&remote, None);

        handle.notify(&with_initials("AA"));
        assert_eq!(handle.flush().await, SyncStatus::Error);

        // No retry on its own
        remote.set_failing(false);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.status(), SyncStatus::Error);
        assert_eq!(remote.write_count(), 0);

        handle.notify(&with_initials("BB"));
        assert_eq!(handle.flush().await, SyncStatus::Synced);
        assert_eq!(written_initials(&remote), vec!["BB"]);
    }

    #[tokio::test(start_paused = true)]
    async fn changes_during_a_sync_wait_for_it() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_latency(Duration::from_secs(1));
        let mut handle = spawn(&remote, None);

        handle.notify(&with_initials("AA"));
        // Past the quiet period: the first sync is now running
        tokio::time::sleep(Duration::from_millis(900)).await;
        handle.notify(&with_initials("BB"));
        handle.notify(&with_initials("CC"));

        assert_eq!(handle.flush().await, SyncStatus::Synced);
        assert_eq!(written_initials(&remote), vec!["AA", "CC"]);
        let profile = remote.snapshot().await.profiles;
        assert_eq!(profile[0].user_initials.as_deref(), Some("CC"));
    }

    #[tokio::test(start_paused = true)]
    async fn status_changes_are_observable() {
        let remote = Arc::new(MemoryRemote::new());
        let mut handle = spawn(&remote, None);
        let mut rx = handle.subscribe();

        handle.notify(&with_initials("AA"));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SyncStatus::Syncing);
        handle.flush().await;
        assert_eq!(*rx.borrow_and_update(), SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_pending_change() {
        let remote = Arc::new(MemoryRemote::new());
        let mut handle = spawn(&remote, None);
        handle.notify(&with_initials("AA"));
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn offline_handle_never_syncs() {
        let mut handle = SyncHandle::offline();
        handle.notify(&default_state());
        assert_eq!(handle.status(), SyncStatus::Offline);
        assert_eq!(handle.flush().await, SyncStatus::Offline);
    }
}
