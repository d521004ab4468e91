use therapylog_types::{next_client_id, next_session_id, Client, Session};

// ── next_client_id ────────────────────────────────────────────────

#[test]
fn first_client_of_the_day_gets_01() {
    assert_eq!(next_client_id(&[], "2024-01-01"), "20240101-01");
}

#[test]
fn client_id_continues_from_highest_sequence() {
    let existing = vec![
        Client::new("20240101-01", "A"),
        Client::new("20240101-03", "B"),
        Client::new("20240102-09", "C"),
    ];
    assert_eq!(next_client_id(&existing, "2024-01-01"), "20240101-04");
    assert_eq!(next_client_id(&existing, "2024-01-02"), "20240102-10");
    assert_eq!(next_client_id(&existing, "2024-01-03"), "20240103-01");
}

#[test]
fn client_id_ignores_malformed_keys() {
    let existing = vec![
        Client::new("20240101-xx", "A"),
        Client::new("garbage", "B"),
    ];
    assert_eq!(next_client_id(&existing, "2024-01-01"), "20240101-01");
}

#[test]
fn invalid_intake_date_falls_back_to_today() {
    let id = next_client_id(&[], "not a date");
    let today = chrono::Local::now().date_naive().format("%Y%m%d").to_string();
    assert_eq!(id, format!("{today}-01"));
}

#[test]
fn sequence_past_99_keeps_growing() {
    let existing = vec![Client::new("20240101-99", "A")];
    assert_eq!(next_client_id(&existing, "2024-01-01"), "20240101-100");
}

// ── next_session_id ───────────────────────────────────────────────

#[test]
fn first_session_gets_s01() {
    assert_eq!(next_session_id("20240101-01", &[]), "20240101-01-S01");
}

#[test]
fn session_id_only_counts_the_same_client() {
    let existing = vec![
        Session::scheduled("20240101-01", "20240101-01-S01", "2024-01-02"),
        Session::scheduled("20240101-01", "20240101-01-S04", "2024-01-09"),
        Session::scheduled("20240101-02", "20240101-02-S11", "2024-01-09"),
    ];
    assert_eq!(next_session_id("20240101-01", &existing), "20240101-01-S05");
    assert_eq!(next_session_id("20240101-02", &existing), "20240101-02-S12");
}

// ── Properties ────────────────────────────────────────────────────

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The generated key never collides with an existing one.
        #[test]
        fn next_client_id_is_fresh(seqs in prop::collection::vec(1u32..200, 0..20)) {
            let existing: Vec<Client> = seqs
                .iter()
                .map(|n| Client::new(format!("20240101-{n:02}"), "x"))
                .collect();
            let next = next_client_id(&existing, "2024-01-01");
            prop_assert!(next.starts_with("20240101-"));
            prop_assert!(existing.iter().all(|c| c.client_id != next));
        }

        #[test]
        fn next_session_id_is_fresh(seqs in prop::collection::vec(1u32..200, 0..20)) {
            let existing: Vec<Session> = seqs
                .iter()
                .map(|n| Session::scheduled("c", format!("c-S{n:02}"), "2024-01-02"))
                .collect();
            let next = next_session_id("c", &existing);
            prop_assert!(existing.iter().all(|s| s.session_id != next));
        }
    }
}
