#![cfg(feature = "sqlite")]

use std::sync::Arc;

use glossar::{AccountSecurityConfig, AccountUpdate, Glossar, SqliteStorage};

async fn glossar() -> Glossar<glossar::SqliteAccountRepository> {
    let storage = SqliteStorage::connect("sqlite::memory:").await.unwrap();
    storage.migrate().await.unwrap();
    Glossar::new(storage.accounts()).with_config(
        AccountSecurityConfig::default()
            .with_max_failed_login_attempts(3)
            .with_inactivity_threshold_minutes(5),
    )
}

#[tokio::test]
async fn test_sqlite_login_lifecycle() {
    let glossar = glossar().await;
    glossar.create_account("alice", "g3h3im").await.unwrap();

    let redirect = glossar.login("alice", "g3h3im").await.unwrap();
    assert_eq!(redirect.location, "/app/hauptseite");

    let alice = glossar
        .get_account_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert!(alice.has_logged_in());
    assert_eq!(alice.failed_login_attempts, 0);

    for _ in 0..2 {
        glossar.login("alice", "wrong").await.unwrap();
    }
    let redirect = glossar.login("alice", "wrong").await.unwrap();
    assert_eq!(redirect.update, AccountUpdate::Locked { failed_attempts: 3 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_concurrent_failures_are_all_counted() {
    let glossar = Arc::new(glossar().await);
    glossar.create_account("bob", "right").await.unwrap();

    let outcome = glossar.authenticate("bob", "wrong").await.unwrap();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let glossar = glossar.clone();
        let outcome = outcome.clone();
        handles.push(tokio::spawn(async move {
            glossar.record_login_outcome(outcome).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let bob = glossar.get_account_by_username("bob").await.unwrap().unwrap();
    assert_eq!(bob.failed_login_attempts, 6);
    assert!(!bob.active);
}
