use chrono::{Datelike, Local, NaiveDate};

/// Creation label for a new task, e.g. `Feb 24`
pub fn creation_label(today: NaiveDate) -> String {
    today.format("%b %-d").to_string()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Current time as Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Format an ISO date as `Mon D`. Unparseable input is returned unchanged.
pub fn format_due_date(s: &str) -> String {
    match parse_iso(s) {
        Some(d) => format!("{} {}", d.format("%b"), d.day()),
        None => s.to_string(),
    }
}

/// True when the due date is strictly before `today`. No due date is never overdue.
pub fn is_overdue(due: Option<&str>, today: NaiveDate) -> bool {
    due.and_then(parse_iso).is_some_and(|d| d < today)
}

/// Days from `today` until the due date: 0 today, negative when past
pub fn days_until(due: &str, today: NaiveDate) -> Option<i64> {
    parse_iso(due).map(|d| (d - today).num_days())
}
