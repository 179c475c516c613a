//! Integration tests for VideoSessionManager using a scripted mock of the
//! remote video-avatar service. Fully deterministic — no network.
//!
//! Run: cargo test --test video_manager_test

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use preen::store::{MemoryBackend, VideoStatus};
use preen::video::{CreateConversationReply, VideoServiceClient, VideoSessionManager};
use preen::Error;

// ---------------------------------------------------------------------------
// Mock implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Create,
    Status(String),
    End(String),
}

struct MockVideoClient {
    ops: Mutex<Vec<Op>>,
    create_replies: Mutex<VecDeque<preen::Result<CreateConversationReply>>>,
    status_replies: Mutex<VecDeque<preen::Result<VideoStatus>>>,
    end_replies: Mutex<VecDeque<preen::Result<()>>>,
}

impl MockVideoClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            ops: Mutex::new(Vec::new()),
            create_replies: Mutex::new(VecDeque::new()),
            status_replies: Mutex::new(VecDeque::new()),
            end_replies: Mutex::new(VecDeque::new()),
        })
    }

    fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    fn push_create(&self, reply: preen::Result<CreateConversationReply>) {
        self.create_replies.lock().unwrap().push_back(reply);
    }

    fn push_status(&self, reply: preen::Result<VideoStatus>) {
        self.status_replies.lock().unwrap().push_back(reply);
    }

    fn push_end(&self, reply: preen::Result<()>) {
        self.end_replies.lock().unwrap().push_back(reply);
    }
}

fn good_create(id: &str) -> CreateConversationReply {
    CreateConversationReply {
        conversation_id: Some(id.to_string()),
        conversation_url: Some(format!("https://avatar.example.com/{id}")),
        status: Some("pending".to_string()),
    }
}

#[async_trait]
impl VideoServiceClient for MockVideoClient {
    async fn create_conversation(
        &self,
        _name: &str,
        _context: &str,
        _persona_id: &str,
    ) -> preen::Result<CreateConversationReply> {
        self.ops.lock().unwrap().push(Op::Create);
        self.create_replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("mock create called without a scripted reply")
    }

    async fn get_conversation_status(&self, conversation_id: &str) -> preen::Result<VideoStatus> {
        self.ops
            .lock()
            .unwrap()
            .push(Op::Status(conversation_id.to_string()));
        self.status_replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("mock status called without a scripted reply")
    }

    async fn end_conversation(&self, conversation_id: &str) -> preen::Result<()> {
        self.ops
            .lock()
            .unwrap()
            .push(Op::End(conversation_id.to_string()));
        self.end_replies.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn name(&self) -> &str {
        "mock-video"
    }
}

struct Harness {
    client: Arc<MockVideoClient>,
    backend: Arc<MemoryBackend>,
    manager: VideoSessionManager,
    notices: preen::notify::NoticeReceiver,
}

fn harness() -> Harness {
    let _ = env_logger::try_init();
    let client = MockVideoClient::new();
    let backend = Arc::new(MemoryBackend::new());
    let (manager, notices) = VideoSessionManager::new(client.clone(), backend.clone());
    let manager = manager.with_cleanup_grace(Duration::ZERO);
    Harness {
        client,
        backend,
        manager,
        notices,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Create validates the reply, tracks the id, persists a record, and
/// returns a joinable session.
#[tokio::test]
async fn create_tracks_and_persists() {
    let mut h = harness();
    h.client.push_create(Ok(good_create("c_1")));

    let session = h
        .manager
        .create_session("Style check", "outfit feedback", "p_style_01", Some("s_9"))
        .await
        .unwrap();

    assert_eq!(session.conversation_id, "c_1");
    assert_eq!(session.conversation_url, "https://avatar.example.com/c_1");
    assert_eq!(session.session_id.as_deref(), Some("s_9"));
    assert_eq!(h.manager.active_ids(), vec!["c_1".to_string()]);
    assert_eq!(h.manager.current_conversation().as_deref(), Some("c_1"));

    let rows = h.backend.video_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].conversation_id, "c_1");
    assert_eq!(rows[0].session_id.as_deref(), Some("s_9"));
    assert!(h.notices.try_recv().is_err());
}

/// Scenario D: creating while a conversation is tracked ends it first —
/// the end call reaches the service before the create call, and the
/// active set holds only the new id afterwards.
#[tokio::test]
async fn create_runs_cleanup_before_create() {
    let mut h = harness();
    h.client.push_create(Ok(good_create("c_old")));
    h.client.push_create(Ok(good_create("c_new")));

    h.manager
        .create_session("first", "ctx", "p", None)
        .await
        .unwrap();
    h.manager
        .create_session("second", "ctx", "p", None)
        .await
        .unwrap();

    assert_eq!(
        h.client.ops(),
        vec![Op::Create, Op::End("c_old".into()), Op::Create]
    );
    assert_eq!(h.manager.active_ids(), vec!["c_new".to_string()]);
    let _ = h.notices.try_recv();
}

/// A success reply missing the id or URL is malformed; nothing is tracked
/// or persisted.
#[tokio::test]
async fn create_rejects_malformed_reply() {
    let h = harness();
    h.client.push_create(Ok(CreateConversationReply {
        conversation_id: Some("c_1".into()),
        conversation_url: None,
        status: Some("pending".into()),
    }));

    let err = h
        .manager
        .create_session("x", "ctx", "p", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
    assert!(h.manager.active_ids().is_empty());
    assert!(h.backend.video_rows().is_empty());
}

/// An unparseable conversation URL is just as malformed as a missing one.
#[tokio::test]
async fn create_rejects_unjoinable_url() {
    let h = harness();
    h.client.push_create(Ok(CreateConversationReply {
        conversation_id: Some("c_1".into()),
        conversation_url: Some("not a url".into()),
        status: None,
    }));

    let err = h
        .manager
        .create_session("x", "ctx", "p", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
}

/// A concurrency-cap rejection gets the friendlier message and a distinct
/// error.
#[tokio::test]
async fn create_concurrency_limit_gets_friendly_notice() {
    let mut h = harness();
    h.client.push_create(Err(Error::RemoteCall {
        status: 400,
        body: "User has reached maximum concurrent conversations".into(),
    }));

    let err = h
        .manager
        .create_session("x", "ctx", "p", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConcurrencyLimit));

    let notice = h.notices.try_recv().unwrap();
    assert!(notice.message.to_lowercase().contains("cleaning up"));
}

/// A persistence failure after a successful remote create is logged but
/// does not fail the operation — the remote session must not look
/// orphaned.
#[tokio::test]
async fn create_survives_persistence_failure() {
    let h = harness();
    h.client.push_create(Ok(good_create("c_1")));
    h.backend.fail_video(true);

    let session = h
        .manager
        .create_session("x", "ctx", "p", None)
        .await
        .unwrap();
    assert_eq!(session.conversation_id, "c_1");
    assert_eq!(h.manager.active_ids(), vec!["c_1".to_string()]);
}

/// Ending twice has the same local effect as ending once, with no error
/// on the second call.
#[tokio::test]
async fn end_session_is_idempotent() {
    let h = harness();
    h.client.push_create(Ok(good_create("c_1")));
    h.manager.create_session("x", "ctx", "p", None).await.unwrap();

    h.manager.end_session("c_1", true).await.unwrap();
    assert!(h.manager.active_ids().is_empty());
    assert!(h.manager.current_conversation().is_none());

    h.manager.end_session("c_1", true).await.unwrap();
    assert!(h.manager.active_ids().is_empty());
    assert!(h.manager.current_conversation().is_none());
}

/// The id leaves local tracking even when the remote end call fails; the
/// cleanup path swallows the failure, the user-initiated path surfaces
/// it.
#[tokio::test]
async fn end_session_never_leaks_tracking() {
    let mut h = harness();
    h.client.push_create(Ok(good_create("c_1")));
    h.manager.create_session("x", "ctx", "p", None).await.unwrap();

    h.client.push_end(Err(Error::Connection("socket closed".into())));
    let err = h.manager.end_session("c_1", true).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert!(h.manager.active_ids().is_empty());
    assert!(h.notices.try_recv().is_ok());

    // cleanup path: same failure, no error surfaced
    h.client.push_create(Ok(good_create("c_2")));
    h.manager.create_session("y", "ctx", "p", None).await.unwrap();
    h.client.push_end(Err(Error::Connection("socket closed".into())));
    h.manager.end_session("c_2", false).await.unwrap();
    assert!(h.manager.active_ids().is_empty());
}

/// end_all_active ends what is tracked and clears the set even when the
/// remote call fails.
#[tokio::test]
async fn end_all_active_is_failure_tolerant() {
    let h = harness();
    h.client.push_create(Ok(good_create("c_1")));
    h.manager.create_session("x", "ctx", "p", None).await.unwrap();

    h.client.push_end(Err(Error::Connection("boom".into())));
    h.manager.end_all_active().await;
    assert!(h.manager.active_ids().is_empty());

    let ends: Vec<_> = h
        .client
        .ops()
        .into_iter()
        .filter(|op| matches!(op, Op::End(_)))
        .collect();
    assert_eq!(ends, vec![Op::End("c_1".into())]);

    // a second sweep over an empty set touches the service not at all
    h.manager.end_all_active().await;
    let ends_after: Vec<_> = h
        .client
        .ops()
        .into_iter()
        .filter(|op| matches!(op, Op::End(_)))
        .collect();
    assert_eq!(ends_after.len(), 1);
}

/// get_status mirrors the polled value into the persisted record and
/// reconciles terminal states out of local tracking.
#[tokio::test]
async fn get_status_mirrors_and_reconciles() {
    let h = harness();
    h.client.push_create(Ok(good_create("c_1")));
    h.manager.create_session("x", "ctx", "p", None).await.unwrap();

    h.client.push_status(Ok(VideoStatus::Active));
    assert_eq!(h.manager.get_status("c_1").await.unwrap(), VideoStatus::Active);
    assert_eq!(h.backend.video_rows()[0].status, VideoStatus::Active);
    assert_eq!(h.manager.active_ids(), vec!["c_1".to_string()]);

    h.client.push_status(Ok(VideoStatus::Ended));
    assert_eq!(h.manager.get_status("c_1").await.unwrap(), VideoStatus::Ended);
    assert_eq!(h.backend.video_rows()[0].status, VideoStatus::Ended);
    assert!(h.manager.active_ids().is_empty());
    assert!(h.manager.current_conversation().is_none());
}

/// A failed poll propagates without touching local state.
#[tokio::test]
async fn get_status_failure_leaves_state_alone() {
    let h = harness();
    h.client.push_create(Ok(good_create("c_1")));
    h.manager.create_session("x", "ctx", "p", None).await.unwrap();

    h.client.push_status(Err(Error::Connection("poll failed".into())));
    let err = h.manager.get_status("c_1").await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert_eq!(h.manager.active_ids(), vec!["c_1".to_string()]);
    assert_eq!(h.backend.video_rows()[0].status, VideoStatus::Pending);
}

/// wait_until_active returns once the conversation is joinable.
#[tokio::test(start_paused = true)]
async fn wait_until_active_polls_to_readiness() {
    let h = harness();
    h.client.push_create(Ok(good_create("c_1")));
    h.manager.create_session("x", "ctx", "p", None).await.unwrap();

    h.client.push_status(Ok(VideoStatus::Pending));
    h.client.push_status(Ok(VideoStatus::Pending));
    h.client.push_status(Ok(VideoStatus::Active));

    let status = h
        .manager
        .wait_until_active("c_1", Duration::from_secs(40))
        .await
        .unwrap();
    assert_eq!(status, VideoStatus::Active);
}

/// wait_until_active gives up with the timeout error when the
/// conversation never becomes joinable within the bound.
#[tokio::test(start_paused = true)]
async fn wait_until_active_times_out() {
    let h = harness();
    h.client.push_create(Ok(good_create("c_1")));
    h.manager.create_session("x", "ctx", "p", None).await.unwrap();

    for _ in 0..30 {
        h.client.push_status(Ok(VideoStatus::Pending));
    }

    let err = h
        .manager
        .wait_until_active("c_1", Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
}
