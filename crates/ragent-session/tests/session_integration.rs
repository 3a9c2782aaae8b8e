#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use ragent_core::Role;
use ragent_session::{InMemorySessionStore, SessionConfig, SessionStore};

fn store(ttl_secs: u64, max_history: usize) -> InMemorySessionStore {
    InMemorySessionStore::from_config(&SessionConfig {
        ttl_secs,
        max_history,
        ..SessionConfig::default()
    })
}

#[tokio::test]
async fn test_twenty_five_appends_keep_twenty_newest() {
    let store = store(3600, 10);
    let id = store.create().await.unwrap();
    store.append(&id, Role::System, "You are helpful.").await.unwrap();

    for i in 0..25 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        store.append(&id, role, &format!("message {i}")).await.unwrap();
    }

    let history = store.history(&id).await.unwrap();
    assert_eq!(history.len(), 21);
    assert_eq!(history[0].role, Role::System);

    let expected: Vec<String> = (5..25).map(|i| format!("message {i}")).collect();
    let kept: Vec<String> = history[1..].iter().map(|m| m.content.clone()).collect();
    assert_eq!(kept, expected);
}

#[tokio::test]
async fn test_trimming_without_system_message() {
    let store = store(3600, 2);
    let id = store.create().await.unwrap();
    for i in 0..7 {
        store.append(&id, Role::User, &i.to_string()).await.unwrap();
    }
    let kept: Vec<String> = store
        .history(&id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(kept, vec!["3", "4", "5", "6"]);
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_expires() {
    let store = store(1, 10);
    let id = store.create().await.unwrap();
    store.append(&id, Role::User, "hello").await.unwrap();
    assert!(store.exists(&id).await.unwrap());

    tokio::time::advance(Duration::from_secs(2)).await;

    assert!(!store.exists(&id).await.unwrap());
    assert!(store.history(&id).await.unwrap().is_empty());
    assert_eq!(store.active_count().await, 0);

    let fresh = store.create().await.unwrap();
    assert_ne!(fresh, id);
    assert!(store.exists(&fresh).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_sweep_after_idle_period() {
    let store = store(1, 10);
    for _ in 0..3 {
        store.create().await.unwrap();
    }
    assert_eq!(store.sweep().await.unwrap(), 0);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(store.sweep().await.unwrap(), 3);
    assert_eq!(store.active_count().await, 0);
}

#[tokio::test]
async fn test_concurrent_appends_are_not_lost() {
    let store = Arc::new(store(3600, 100));
    let id = store.create().await.unwrap();

    let mut handles = Vec::new();
    for task in 0..8 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                store
                    .append(&id, Role::User, &format!("{task}-{i}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.history(&id).await.unwrap().len(), 80);
}
