pub mod engine;
pub mod remote;
pub mod session;
pub mod tables;
pub mod worker;

pub use engine::{fetch_app_state, has_remote_data, sync_app_state};
pub use remote::{RemoteError, RemoteStore};
pub use session::{InitialLoad, MigrationChoice, apply_migration_choice, resolve_initial_load};
pub use tables::{FileRemote, MemoryRemote};
pub use worker::{DEFAULT_DEBOUNCE, SyncHandle, fingerprint};
