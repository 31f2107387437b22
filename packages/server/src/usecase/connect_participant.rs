//! UseCase: 参加者接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase の `authenticate()` と `join()`
//! - 参加時に送るイベントの宛先と順序
//!
//! ### どのような状況を想定しているか
//! - 正常系：最初の参加者によるルーム作成、既存ルームへの参加
//! - 異常系：不正なトークン、不正なクエリ、ルーム設定の読み込み失敗
//! - エッジケース：チャット無効のルーム、同じルームへの同時参加

use std::sync::Arc;

use studyroom_shared::time::{Clock, format_chat_time};

use crate::{
    domain::{
        ConnectionContext, ConnectionId, ConnectionPhase, Identity, ImageUrl, Member,
        MessagePusher, Nickname, PusherChannel, RoomId, RoomRepository, RoomSnapshot,
        SessionStore, Timestamp, ValueObjectError,
    },
    infrastructure::dto::websocket::{
        ChatPresencePayload, MemberJoinedPayload, RoomAndMyInfo, ServerEvent,
    },
};

use super::{
    broadcast_router::{BroadcastRouter, Target},
    error::ConnectError,
    session_table::SessionTable,
    token_validator::TokenValidator,
};

/// 接続時のクエリ（未検証）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionQuery {
    pub room_id: Option<String>,
    pub nickname: Option<String>,
    pub image_url: Option<String>,
}

impl ConnectionQuery {
    fn into_context(self) -> Result<ConnectionContext, ValueObjectError> {
        Ok(ConnectionContext {
            room_id: RoomId::new(self.room_id.unwrap_or_default())?,
            nickname: Nickname::new(self.nickname.unwrap_or_default())?,
            image_url: ImageUrl::new(self.image_url.unwrap_or_default())?,
        })
    }
}

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    repository: Arc<dyn RoomRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    session_store: Arc<dyn SessionStore>,
    sessions: Arc<SessionTable>,
    router: Arc<BroadcastRouter>,
    token_validator: TokenValidator,
    clock: Arc<dyn Clock>,
}

impl ConnectParticipantUseCase {
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        session_store: Arc<dyn SessionStore>,
        sessions: Arc<SessionTable>,
        router: Arc<BroadcastRouter>,
        token_validator: TokenValidator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            session_store,
            sessions,
            router,
            token_validator,
            clock,
        }
    }

    /// 新しい接続を登録（`Connecting`）
    pub async fn open(&self, connection_id: ConnectionId, sender: PusherChannel) {
        self.message_pusher
            .register_client(connection_id.clone(), sender)
            .await;
        self.sessions.open(connection_id.clone()).await;
        tracing::debug!("Connection opened: {}", connection_id.as_str());
    }

    /// 接続を認証する
    ///
    /// 失敗した場合、接続は `Closed` になる。呼び出し側は `rejected` イベントを
    /// 送ってから接続を閉じること。
    pub async fn authenticate(
        &self,
        connection_id: &ConnectionId,
        raw_token: Option<&str>,
    ) -> Result<Identity, ConnectError> {
        self.sessions
            .advance(connection_id, ConnectionPhase::Authenticating)
            .await?;

        match self.token_validator.validate(raw_token).await {
            Ok(identity) => {
                self.sessions
                    .authenticate(connection_id, identity.clone())
                    .await?;
                tracing::info!(
                    "Connection '{}' authenticated as '{}'",
                    connection_id.as_str(),
                    identity.subject
                );
                Ok(identity)
            }
            Err(e) => {
                if let Err(phase_error) = self
                    .sessions
                    .advance(connection_id, ConnectionPhase::Closed)
                    .await
                {
                    tracing::warn!("Failed to close '{}': {}", connection_id.as_str(), phase_error);
                }
                Err(e.into())
            }
        }
    }

    /// 認証済みの接続をルームに参加させる
    ///
    /// # Returns
    ///
    /// * `Ok(RoomSnapshot)` - 参加成功（参加者自身を含むスナップショット）
    /// * `Err(ConnectError)` - 参加失敗。ルーム登録前の失敗なら `Authenticated` に戻る
    pub async fn join(
        &self,
        connection_id: &ConnectionId,
        query: ConnectionQuery,
    ) -> Result<RoomSnapshot, ConnectError> {
        let context = query.into_context()?;
        self.sessions
            .begin_join(connection_id, context.clone())
            .await?;

        let result = self.enter_room(connection_id, &context).await;

        let in_room = self
            .repository
            .is_member(&context.room_id, connection_id)
            .await;
        self.sessions.finish_join(connection_id, in_room).await?;

        let snapshot = result?;
        tracing::info!(
            "'{}' joined room '{}' ({} member(s))",
            context.nickname.as_str(),
            context.room_id.as_str(),
            snapshot.current_member.len()
        );
        Ok(snapshot)
    }

    async fn enter_room(
        &self,
        connection_id: &ConnectionId,
        context: &ConnectionContext,
    ) -> Result<RoomSnapshot, ConnectError> {
        let room_id = &context.room_id;
        let _guard = self.repository.lock_room(room_id).await;
        let now = Timestamp::new(self.clock.now_millis());

        // 1. ルームが無ければ設定を読み込んで作成
        if !self.repository.contains_room(room_id).await {
            let seed = self
                .session_store
                .load_room(room_id, self.clock.today())
                .await?;
            self.repository.get_or_create(room_id.clone(), seed, now).await;
        }

        // 2. メンバー登録（スナップショットは必ず自分を含む）
        self.repository
            .add_member(
                room_id,
                Member {
                    connection_id: connection_id.clone(),
                    nickname: context.nickname.clone(),
                    image_url: context.image_url.clone(),
                    joined_at: now,
                },
            )
            .await?;
        let snapshot = self.repository.snapshot(room_id, now).await?;

        // 3. 通知
        self.router
            .emit(
                connection_id,
                Target::Origin,
                &ServerEvent::GetRoomAndMyInfo(RoomAndMyInfo::from_snapshot(
                    snapshot.clone(),
                    connection_id,
                )),
            )
            .await;
        self.router
            .emit(
                connection_id,
                Target::RoomExceptOrigin(room_id.clone()),
                &ServerEvent::AddMemberAndRequestUserInfo(MemberJoinedPayload {
                    nickname: context.nickname.as_str().to_string(),
                    image_url: context.image_url.as_str().to_string(),
                    total_time: snapshot.total_time,
                    state: Default::default(),
                    socket_id: connection_id.as_str().to_string(),
                }),
            )
            .await;
        if snapshot.is_chat {
            self.router
                .emit(
                    connection_id,
                    Target::Room(room_id.clone()),
                    &ServerEvent::JoinChat(ChatPresencePayload {
                        nickname: context.nickname.as_str().to_string(),
                        time: format_chat_time(now.value()),
                    }),
                )
                .await;
        }

        Ok(snapshot)
    }
}
