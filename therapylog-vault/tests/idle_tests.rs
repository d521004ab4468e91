mod common;

use common::{memory_vault, PASSWORD};
use std::time::Duration;
use therapylog_vault::{ActivityClock, IdleLock, SessionKeyHolder, VaultError};

const TIMEOUT: Duration = Duration::from_secs(300);

fn unlocked_holder() -> SessionKeyHolder {
    let holder = SessionKeyHolder::new();
    holder.set(therapylog_crypto::generate_random_key());
    holder
}

#[tokio::test(start_paused = true)]
async fn locks_after_timeout() {
    let holder = unlocked_holder();
    let _idle = IdleLock::spawn(holder.clone(), ActivityClock::new(), TIMEOUT);

    tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
    assert!(holder.is_unlocked());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!holder.is_unlocked());
}

#[tokio::test(start_paused = true)]
async fn activity_postpones_lock() {
    let holder = unlocked_holder();
    let activity = ActivityClock::new();
    let _idle = IdleLock::spawn(holder.clone(), activity.clone(), TIMEOUT);

    tokio::time::sleep(Duration::from_secs(240)).await;
    activity.touch();
    tokio::time::sleep(Duration::from_secs(240)).await;
    assert!(holder.is_unlocked());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(!holder.is_unlocked());
}

#[tokio::test(start_paused = true)]
async fn stopped_lock_does_nothing() {
    let holder = unlocked_holder();
    let idle = IdleLock::spawn(holder.clone(), ActivityClock::new(), TIMEOUT);
    idle.stop();

    tokio::time::sleep(TIMEOUT * 2).await;
    assert!(holder.is_unlocked());
}

#[tokio::test(start_paused = true)]
async fn relocks_after_a_later_unlock() {
    let holder = SessionKeyHolder::new();
    let activity = ActivityClock::new();
    let _idle = IdleLock::spawn(holder.clone(), activity.clone(), TIMEOUT);

    tokio::time::sleep(TIMEOUT * 2).await;
    holder.set(therapylog_crypto::generate_random_key());
    activity.touch();

    tokio::time::sleep(TIMEOUT + TIMEOUT / 2).await;
    assert!(!holder.is_unlocked());
}

#[tokio::test(start_paused = true)]
async fn vault_operations_count_as_activity() {
    let vault = memory_vault();
    vault.setup(PASSWORD).await.unwrap();
    let _idle = vault.spawn_idle_lock();

    tokio::time::sleep(Duration::from_secs(200)).await;
    vault.list_clients().await.unwrap();
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(vault.is_unlocked());

    tokio::time::sleep(Duration::from_secs(101)).await;
    assert!(matches!(
        vault.list_clients().await,
        Err(VaultError::Locked)
    ));
}
