//! UseCase: イベントの宛先解決と配送
//!
//! 宛先は常にルームの現在のメンバーから解決する。送信元の接続が宛先に
//! 含まれるかどうかは `Target` の種類だけで決まる。

use std::{fmt, sync::Arc};

use crate::{
    domain::{ConnectionId, MessagePusher, RoomId, RoomRepository},
    infrastructure::dto::websocket::ServerEvent,
};

/// 配送先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 送信元の接続のみ
    Origin,
    /// 送信元を除くルームの全メンバー
    RoomExceptOrigin(RoomId),
    /// 送信元を含むルームの全メンバー
    Room(RoomId),
    /// ルーム内の特定の 1 接続
    Peer {
        room_id: RoomId,
        connection_id: ConnectionId,
    },
}

pub struct BroadcastRouter {
    repository: Arc<dyn RoomRepository>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl BroadcastRouter {
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// イベントを配送し、届いた接続の数を返す
    ///
    /// 個々の宛先への配送失敗はログに残すだけで、送信元には返さない。
    pub async fn emit(&self, origin: &ConnectionId, target: Target, event: &ServerEvent) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize '{}' event: {}", event.name(), e);
                return 0;
            }
        };

        let recipients = self.resolve(origin, &target).await;
        if recipients.is_empty() {
            tracing::debug!("No recipients for '{}' ({:?})", event.name(), target);
            return 0;
        }

        let expected = recipients.len();
        let delivered = self.message_pusher.broadcast(recipients, &payload).await;
        if delivered < expected {
            tracing::warn!(
                "Delivered '{}' to {}/{} recipient(s)",
                event.name(),
                delivered,
                expected
            );
        }
        delivered
    }

    /// 失敗を送信元にだけ `error` イベントとして報告する
    ///
    /// 失敗からクライアント向けのエラーへの変換はここだけで行う。
    pub async fn report_failure(&self, origin: &ConnectionId, error: &impl fmt::Display) {
        tracing::error!("Request from '{}' failed: {}", origin.as_str(), error);
        self.emit(origin, Target::Origin, &ServerEvent::failed(error))
            .await;
    }

    async fn resolve(&self, origin: &ConnectionId, target: &Target) -> Vec<ConnectionId> {
        match target {
            Target::Origin => vec![origin.clone()],
            Target::RoomExceptOrigin(room_id) => self
                .repository
                .member_ids(room_id)
                .await
                .into_iter()
                .filter(|id| id != origin)
                .collect(),
            Target::Room(room_id) => self.repository.member_ids(room_id).await,
            Target::Peer {
                room_id,
                connection_id,
            } => {
                if self.repository.is_member(room_id, connection_id).await {
                    vec![connection_id.clone()]
                } else {
                    tracing::warn!(
                        "Peer '{}' is not a member of room '{}'",
                        connection_id.as_str(),
                        room_id.as_str()
                    );
                    Vec::new()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        infrastructure::dto::websocket::{ChatAckPayload, MemberLeftPayload},
        usecase::test_support::Fixture,
    };

    fn ack() -> ServerEvent {
        ServerEvent::ResponseChat(ChatAckPayload { success: true })
    }

    #[tokio::test]
    async fn test_room_except_origin_excludes_sender() {
        // テスト項目: RoomExceptOrigin は送信元以外の全メンバーに届く
        // given (前提条件):
        let fixture = Fixture::new();
        let room_id = fixture.room_id("room-1");
        let mut alice = fixture.member(&room_id, "alice").await;
        let mut bob = fixture.member(&room_id, "bob").await;
        let mut carol = fixture.member(&room_id, "carol").await;

        // when (操作):
        let delivered = fixture
            .router
            .emit(&alice.id, Target::RoomExceptOrigin(room_id), &ack())
            .await;

        // then (期待する結果):
        assert_eq!(delivered, 2);
        assert_eq!(bob.next_event().await, "responseChat");
        assert_eq!(carol.next_event().await, "responseChat");
        assert!(alice.is_idle());
    }

    #[tokio::test]
    async fn test_room_includes_sender() {
        // テスト項目: Room は送信元を含む全メンバーに届く
        // given (前提条件):
        let fixture = Fixture::new();
        let room_id = fixture.room_id("room-1");
        let mut alice = fixture.member(&room_id, "alice").await;
        let mut bob = fixture.member(&room_id, "bob").await;

        // when (操作):
        let delivered = fixture
            .router
            .emit(&alice.id, Target::Room(room_id), &ack())
            .await;

        // then (期待する結果):
        assert_eq!(delivered, 2);
        assert_eq!(alice.next_event().await, "responseChat");
        assert_eq!(bob.next_event().await, "responseChat");
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        // テスト項目: 他のルームのメンバーには届かない
        // given (前提条件):
        let fixture = Fixture::new();
        let room_a = fixture.room_id("room-a");
        let room_b = fixture.room_id("room-b");
        let alice = fixture.member(&room_a, "alice").await;
        let mut outsider = fixture.member(&room_b, "outsider").await;

        // when (操作):
        fixture
            .router
            .emit(&alice.id, Target::Room(room_a), &ack())
            .await;

        // then (期待する結果):
        assert!(outsider.is_idle());
    }

    #[tokio::test]
    async fn test_peer_outside_room_is_dropped() {
        // テスト項目: 送信元のルームにいない接続への Peer 配送は行われない
        // given (前提条件):
        let fixture = Fixture::new();
        let room_a = fixture.room_id("room-a");
        let room_b = fixture.room_id("room-b");
        let alice = fixture.member(&room_a, "alice").await;
        let mut outsider = fixture.member(&room_b, "outsider").await;
        let event = ServerEvent::SubMember(MemberLeftPayload {
            nickname: "alice".to_string(),
            socket_id: alice.id.as_str().to_string(),
        });

        // when (操作):
        let delivered = fixture
            .router
            .emit(
                &alice.id,
                Target::Peer {
                    room_id: room_a,
                    connection_id: outsider.id.clone(),
                },
                &event,
            )
            .await;

        // then (期待する結果):
        assert_eq!(delivered, 0);
        assert!(outsider.is_idle());
    }

    #[tokio::test]
    async fn test_report_failure_reaches_origin_only() {
        // テスト項目: 失敗の報告は送信元だけに error イベントとして届く
        // given (前提条件):
        let fixture = Fixture::new();
        let room_id = fixture.room_id("room-1");
        let mut alice = fixture.member(&room_id, "alice").await;
        let mut bob = fixture.member(&room_id, "bob").await;

        // when (操作):
        fixture
            .router
            .report_failure(&alice.id, &"data store unavailable")
            .await;

        // then (期待する結果):
        let frame = alice.next_frame().await;
        assert_eq!(frame["event"], "error");
        assert_eq!(frame["data"]["error"], "data store unavailable");
        assert!(bob.is_idle());
    }
}
