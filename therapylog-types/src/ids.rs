//! Natural-key generators for clients and sessions.
//!
//! Client keys look like `20240101-01` (intake date plus a per-day
//! sequence); session keys append `-S01`, `-S02`, ... to the client key.

use crate::{Client, Session};
use chrono::{Local, NaiveDate};

/// Returns the next free client key for `intake_date` (`YYYY-MM-DD`).
///
/// An unparseable date falls back to today's local date.
pub fn next_client_id(existing: &[Client], intake_date: &str) -> String {
    let date = NaiveDate::parse_from_str(intake_date, "%Y-%m-%d")
        .unwrap_or_else(|_| Local::now().date_naive());
    let prefix = date.format("%Y%m%d").to_string();

    let max_seq = existing
        .iter()
        .filter_map(|c| c.client_id.split_once('-'))
        .filter(|(day, _)| *day == prefix)
        .filter_map(|(_, seq)| seq.parse::<u64>().ok())
        .max()
        .unwrap_or(0);

    format!("{prefix}-{:02}", successor(max_seq))
}

/// Returns the next session key for `client_id`.
pub fn next_session_id(client_id: &str, existing: &[Session]) -> String {
    let max_seq = existing
        .iter()
        .filter(|s| s.client_id == client_id)
        .filter_map(|s| session_seq(&s.session_id))
        .max()
        .unwrap_or(0);

    format!("{client_id}-S{:02}", successor(max_seq))
}

// Widened so an imported id ending in u64::MAX cannot overflow.
fn successor(seq: u64) -> u128 {
    u128::from(seq) + 1
}

fn session_seq(session_id: &str) -> Option<u64> {
    let (_, tail) = session_id.rsplit_once("-S")?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}
