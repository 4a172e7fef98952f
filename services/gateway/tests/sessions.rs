mod common;

use common::{expired_token_for, token_for, Harness};
use futures::future::join_all;
use realtime_gateway::auth::Credentials;
use realtime_gateway::error::{AuthError, CLOSE_EVICTED};
use realtime_gateway::manager::ManagerStats;
use realtime_gateway::protocol::{Outbound, OutboundKind};
use realtime_gateway::rooms::Room;
use serde_json::json;
use types::ids::UserId;

#[tokio::test]
async fn second_connect_replaces_first_session() {
    let harness = Harness::new();
    let mut first = harness.connect("alice").await;
    let second = harness.connect("alice").await;

    let frames = first.drain();
    assert_eq!(frames.len(), 2, "notice then close, got {frames:?}");
    match &frames[0] {
        Outbound::Event(event) => {
            assert_eq!(event.event, OutboundKind::SessionReplaced);
            assert_eq!(event.data["reason"], "new-session");
        }
        other => panic!("expected session-replaced first, got {other:?}"),
    }
    assert!(matches!(frames[1], Outbound::Close { code, .. } if code == CLOSE_EVICTED));

    let manager = &harness.state.manager;
    assert_eq!(
        manager.connection_of(&UserId::new("alice")),
        Some(second.info.connection_id)
    );
    assert!(!manager.is_live(first.info.connection_id));
    assert_eq!(manager.stats().sessions, 1);
}

#[tokio::test]
async fn concurrent_connects_leave_exactly_one_session() {
    let harness = Harness::new();

    let attempts = (0..8).map(|_| harness.try_connect(Credentials::new(token_for("bob"))));
    let results = join_all(attempts).await;
    assert!(results.iter().all(|(result, _)| result.is_ok()));

    let manager = &harness.state.manager;
    assert_eq!(manager.stats().sessions, 1);
    let live = manager.connection_of(&UserId::new("bob")).unwrap();
    assert!(manager.is_member(live, &Room::User(UserId::new("bob"))));
    assert!(manager.is_member(live, &Room::VendorDashboard(UserId::new("bob"))));

    // Every replaced connection saw a close
    let mut closed = 0;
    for (result, mut rx) in results {
        if result.unwrap().connection_id == live {
            continue;
        }
        while let Ok(frame) = rx.try_recv() {
            if matches!(frame, Outbound::Close { .. }) {
                closed += 1;
            }
        }
    }
    assert_eq!(closed, 7);
}

#[tokio::test]
async fn rejected_handshakes_register_nothing() {
    let harness = Harness::new();

    let cases = [
        (Credentials::default(), AuthError::NoToken),
        (Credentials::new("not-a-jwt"), AuthError::InvalidToken),
        (Credentials::new(expired_token_for("alice")), AuthError::InvalidToken),
        (Credentials::new(token_for("nobody")), AuthError::UserNotFound),
        (
            Credentials::new(token_for("alice")).claiming(UserId::new("carol")),
            AuthError::IdentityMismatch,
        ),
        (Credentials::new(token_for("mallory")), AuthError::AccountInactive),
    ];

    for (credentials, expected) in cases {
        let (result, _rx) = harness.try_connect(credentials).await;
        assert_eq!(result, Err(expected));
    }
    assert_eq!(
        harness.state.manager.stats(),
        ManagerStats {
            sessions: 0,
            rooms: 0
        }
    );
}

#[tokio::test]
async fn matching_claimed_identity_is_accepted() {
    let harness = Harness::new();
    let credentials = Credentials::new(token_for("alice")).claiming(UserId::new("alice"));
    let (result, _rx) = harness.try_connect(credentials).await;
    assert_eq!(result.unwrap().user_id, UserId::new("alice"));
}

#[tokio::test]
async fn frames_from_a_replaced_session_are_ignored() {
    let harness = Harness::new();
    let mut stale = harness.connect("alice").await;
    let _fresh = harness.connect("alice").await;
    stale.drain();

    assert!(
        stale
            .send(&harness, "join-user-room", json!({"userId": "alice"}))
            .await
    );
    assert!(stale.drain().is_empty());
}

#[tokio::test]
async fn disconnect_after_replacement_keeps_new_session() {
    let harness = Harness::new();
    let first = harness.connect("carol").await;
    let second = harness.connect("carol").await;

    let manager = &harness.state.manager;
    assert!(!manager.disconnect(first.info.connection_id));
    assert!(manager.has_session(&UserId::new("carol")));

    assert!(manager.disconnect(second.info.connection_id));
    assert!(!manager.has_session(&UserId::new("carol")));
    assert_eq!(manager.stats().rooms, 0);
}

#[tokio::test]
async fn shutdown_force_disconnects_everyone() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;
    let mut root = harness.connect("root").await;

    harness.state.shutdown();

    for client in [&mut alice, &mut root] {
        let frames = client.drain();
        match &frames[0] {
            Outbound::Event(event) => {
                assert_eq!(event.event, OutboundKind::ForceDisconnect);
                assert_eq!(event.data["reason"], "server-shutdown");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(frames[1], Outbound::Close { .. }));
    }

    let (result, _rx) = harness
        .try_connect(Credentials::new(token_for("alice")))
        .await;
    assert_eq!(result, Err(AuthError::NotAccepting));
}
