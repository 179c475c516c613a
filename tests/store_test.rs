//! ConversationStore contract tests over the in-memory backend.
//!
//! Run: cargo test --test store_test

use std::sync::Arc;

use preen::store::{ConversationStore, MemoryBackend, Role};

fn store() -> (Arc<MemoryBackend>, ConversationStore) {
    let _ = env_logger::try_init();
    let backend = Arc::new(MemoryBackend::new());
    let store = ConversationStore::new(backend.clone());
    (backend, store)
}

/// Appending N turns then listing returns exactly those N turns with
/// identical role/content/visual context, in append order.
#[tokio::test]
async fn append_then_list_roundtrip() {
    let (_backend, store) = store();
    let session = store.create_session(Some("fit check")).await.unwrap();

    let seed: Vec<(Role, &str, Option<&str>)> = vec![
        (Role::User, "how do I look?", Some("data:image/jpeg;base64,abc")),
        (Role::Assistant, "Great — love the jacket.", Some("blue jacket")),
        (Role::User, "and the shoes?", None),
        (Role::Assistant, "Swap them for boots.", None),
    ];
    for (role, content, ctx) in &seed {
        assert!(store.append_turn(&session, *role, content, *ctx).await);
    }

    let turns = store.list_turns(&session).await;
    assert_eq!(turns.len(), seed.len());
    for (turn, (role, content, ctx)) in turns.iter().zip(&seed) {
        assert_eq!(turn.role, *role);
        assert_eq!(turn.content, *content);
        assert_eq!(turn.visual_context.as_deref(), *ctx);
        assert!(turn.complete);
    }
}

/// Turns come back in non-decreasing created_at order.
#[tokio::test]
async fn list_turns_is_time_ordered() {
    let (_backend, store) = store();
    let session = store.create_session(None).await.unwrap();

    for i in 0..10 {
        assert!(
            store
                .append_turn(&session, Role::User, &format!("turn {i}"), None)
                .await
        );
    }

    let turns = store.list_turns(&session).await;
    assert_eq!(turns.len(), 10);
    for pair in turns.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at);
    }
}

/// Sessions list newest-activity-first, and appending bumps a session to
/// the top.
#[tokio::test]
async fn sessions_order_by_recent_activity() {
    let (_backend, store) = store();
    let first = store.create_session(Some("older")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = store.create_session(Some("newer")).await.unwrap();

    let sessions = store.list_sessions().await;
    assert_eq!(sessions[0].id, second);
    assert_eq!(sessions[1].id, first);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert!(store.append_turn(&first, Role::User, "hello again", None).await);

    let sessions = store.list_sessions().await;
    assert_eq!(sessions[0].id, first, "activity must float a session up");
}

/// Sessions get a generated title when none is supplied.
#[tokio::test]
async fn created_session_has_a_default_title() {
    let (_backend, store) = store();
    store.create_session(None).await.unwrap();
    let sessions = store.list_sessions().await;
    assert!(!sessions[0].title.is_empty());
}

/// Deleting a session removes it and its turns; deleting again is
/// harmless.
#[tokio::test]
async fn delete_session_removes_history() {
    let (backend, store) = store();
    let keep = store.create_session(Some("keep")).await.unwrap();
    let drop = store.create_session(Some("drop")).await.unwrap();
    assert!(store.append_turn(&keep, Role::User, "kept", None).await);
    assert!(store.append_turn(&drop, Role::User, "dropped", None).await);

    store.delete_session(&drop).await;
    store.delete_session(&drop).await;

    let sessions = store.list_sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, keep);
    assert!(store.list_turns(&drop).await.is_empty());
    assert_eq!(backend.message_rows().len(), 1);
}

/// Failed writes report false; failed reads report empty; neither panics.
#[tokio::test]
async fn failures_degrade_without_panicking() {
    let (backend, store) = store();
    let session = store.create_session(None).await.unwrap();
    assert!(store.append_turn(&session, Role::User, "ok", None).await);

    backend.fail_messages(true);
    assert!(!store.append_turn(&session, Role::User, "lost", None).await);
    assert!(store.list_turns(&session).await.is_empty());

    backend.fail_messages(false);
    let turns = store.list_turns(&session).await;
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].content, "ok");
}
