//! UseCase: 参加者切断処理
//!
//! 退出は「状態の保存 → 退出の通知 → メンバー削除」の順で行う。
//! 保存に失敗しても退出は最後まで実行し、失敗は報告だけする。

use std::sync::Arc;

use studyroom_shared::time::{Clock, format_chat_time};

use crate::{
    domain::{
        ConnectionContext, ConnectionId, ConnectionStateRecord, MessagePusher, RoomId,
        RoomRepository, SessionStore, Timestamp,
    },
    infrastructure::dto::websocket::{ChatPresencePayload, MemberLeftPayload, ServerEvent},
};

use super::{
    broadcast_router::{BroadcastRouter, Target},
    error::DisconnectError,
    session_table::SessionTable,
};

/// 切断処理の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// 未登録の接続
    Unknown,
    /// 認証前（またはトークン不正）で切断された
    Unauthenticated,
    /// 認証済みだがルームには参加していなかった
    NotJoined,
    /// ルームから退出した
    Left { room_id: RoomId, remaining: usize },
}

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    repository: Arc<dyn RoomRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    session_store: Arc<dyn SessionStore>,
    sessions: Arc<SessionTable>,
    router: Arc<BroadcastRouter>,
    clock: Arc<dyn Clock>,
}

impl DisconnectParticipantUseCase {
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        session_store: Arc<dyn SessionStore>,
        sessions: Arc<SessionTable>,
        router: Arc<BroadcastRouter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            session_store,
            sessions,
            router,
            clock,
        }
    }

    /// 切断処理を実行
    ///
    /// # Returns
    ///
    /// * `Ok(DisconnectOutcome)` - 退出完了
    /// * `Err(DisconnectError)` - 退出は完了したが途中で失敗があった
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<DisconnectOutcome, DisconnectError> {
        let Some(session) = self.sessions.begin_leave(connection_id).await else {
            self.release(connection_id).await;
            return Ok(DisconnectOutcome::Unknown);
        };

        let Some(identity) = session.identity else {
            tracing::info!("Client disconnected: token error ({})", connection_id.as_str());
            self.release(connection_id).await;
            return Ok(DisconnectOutcome::Unauthenticated);
        };

        let context = match session.context {
            Some(context) if session.in_room => context,
            _ => {
                tracing::info!("Client disconnected before joining: {}", identity.subject);
                self.release(connection_id).await;
                return Ok(DisconnectOutcome::NotJoined);
            }
        };

        let result = self
            .leave_room(connection_id, &identity.subject, &context)
            .await;
        if let Err(e) = &result {
            self.router.report_failure(connection_id, e).await;
        }
        self.release(connection_id).await;
        tracing::info!(
            "Client disconnected: {} ({})",
            identity.subject,
            context.room_id.as_str()
        );
        result
    }

    async fn leave_room(
        &self,
        connection_id: &ConnectionId,
        subject: &str,
        context: &ConnectionContext,
    ) -> Result<DisconnectOutcome, DisconnectError> {
        let room_id = &context.room_id;
        let _guard = self.repository.lock_room(room_id).await;
        let now = Timestamp::new(self.clock.now_millis());
        let room = self.repository.get_room(room_id).await?;
        let mut failure = None;

        // 1. 状態の保存
        let record = ConnectionStateRecord {
            connection_id: connection_id.clone(),
            room_id: room_id.clone(),
            subject: subject.to_string(),
            nickname: context.nickname.clone(),
            total_time: room.timer.total_at(now),
            disconnected_at: now,
        };
        if let Err(e) = self.session_store.save_connection_state(record).await {
            tracing::error!(
                "Failed to save state of '{}': {}",
                connection_id.as_str(),
                e
            );
            failure = Some(DisconnectError::Persist(e));
        }

        // 2. 退出の通知
        self.router
            .emit(
                connection_id,
                Target::RoomExceptOrigin(room_id.clone()),
                &ServerEvent::SubMember(MemberLeftPayload {
                    nickname: context.nickname.as_str().to_string(),
                    socket_id: connection_id.as_str().to_string(),
                }),
            )
            .await;

        // 3. メンバー削除（空になったルームは保持ポリシーに従う）
        self.repository.remove_member(room_id, connection_id).await?;

        if room.profile.is_chat {
            self.router
                .emit(
                    connection_id,
                    Target::Room(room_id.clone()),
                    &ServerEvent::LeaveChat(ChatPresencePayload {
                        nickname: context.nickname.as_str().to_string(),
                        time: format_chat_time(now.value()),
                    }),
                )
                .await;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(DisconnectOutcome::Left {
                room_id: room_id.clone(),
                remaining: self.repository.member_ids(room_id).await.len(),
            }),
        }
    }

    async fn release(&self, connection_id: &ConnectionId) {
        self.message_pusher.unregister_client(connection_id).await;
        self.sessions.close(connection_id).await;
    }
}
