//! 会话关闭时的频道清理测试

mod support;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use application::{ClosedSession, SessionDirectory, SessionEvents};
use domain::{ServerId, UserId};
use support::{uids, FakeRegistry, TestHarness};

/// 记录仍在线用户的会话目录
#[derive(Default)]
struct FakeSessions {
    online: Mutex<HashSet<UserId>>,
}

impl FakeSessions {
    fn with_online(ids: &[&str]) -> Self {
        Self {
            online: Mutex::new(uids(ids).into_iter().collect()),
        }
    }
}

impl SessionDirectory for FakeSessions {
    fn has_sessions(&self, uid: &UserId) -> bool {
        self.online.lock().unwrap().contains(uid)
    }
}

async fn setup(online: &[&str]) -> (TestHarness, SessionEvents) {
    let harness = TestHarness::started(FakeRegistry::connectors(&["a", "b"])).await;
    for (name, uid, sid) in [
        ("room1", "u1", "a"),
        ("room2", "u1", "a"),
        ("room1", "u1", "b"),
        ("room1", "u2", "a"),
    ] {
        harness
            .service
            .add(name, &uid.into(), &sid.into())
            .await
            .unwrap();
    }
    let events = SessionEvents::new(
        harness.service.clone(),
        Arc::new(FakeSessions::with_online(online)),
    );
    (harness, events)
}

fn closed(uid: Option<&str>, sid: &str) -> ClosedSession {
    ClosedSession {
        uid: uid.map(UserId::from),
        frontend_id: ServerId::from(sid),
    }
}

#[tokio::test]
async fn test_last_session_leaves_all_channels_on_frontend() {
    let (harness, events) = setup(&[]).await;

    events.on_session_closed(&closed(Some("u1"), "a")).await;

    let a = ServerId::from("a");
    assert_eq!(
        harness.service.get_members_by_sid("room1", &a).await.unwrap(),
        uids(&["u2"])
    );
    assert!(harness
        .service
        .get_members_by_sid("room2", &a)
        .await
        .unwrap()
        .is_empty());
    // 其它前端服务器上的成员关系不受影响
    assert_eq!(
        harness
            .service
            .get_members_by_sid("room1", &"b".into())
            .await
            .unwrap(),
        uids(&["u1"])
    );
}

#[tokio::test]
async fn test_remaining_session_keeps_memberships() {
    let (harness, events) = setup(&["u1"]).await;

    events.on_session_closed(&closed(Some("u1"), "a")).await;

    let channels = harness
        .service
        .get_channels_by_uid(&"u1".into(), &"a".into())
        .await
        .unwrap();
    assert_eq!(channels.len(), 2);
}

#[tokio::test]
async fn test_anonymous_session_is_ignored() {
    let (harness, events) = setup(&[]).await;

    events.on_session_closed(&closed(None, "a")).await;

    let members = harness
        .service
        .get_members_by_sid("room1", &"a".into())
        .await
        .unwrap();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn test_cleanup_failure_is_swallowed() {
    let (harness, events) = setup(&[]).await;
    harness.service.stop().await.unwrap();

    // 服务已关闭，清理失败只记录日志
    events.on_session_closed(&closed(Some("u1"), "a")).await;
}
