//! UseCase: チャット送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendChatUseCase::execute() メソッド
//! - 送信者以外への receiveChat と送信者への responseChat
//!
//! ### どのような状況を想定しているか
//! - 正常系：チャット送信とブロードキャスト
//! - 異常系：空のメッセージ、参加前の送信
//! - エッジケース：送信者しかいないルーム、同じ時刻での連続送信

use std::sync::Arc;

use studyroom_shared::time::{Clock, format_chat_time};

use crate::{
    domain::{ChatMessage, ConnectionId, MessageContent, Timestamp},
    infrastructure::dto::websocket::{ChatAckPayload, SendChatPayload, ServerEvent},
};

use super::{
    broadcast_router::{BroadcastRouter, Target},
    error::ActionError,
    session_table::SessionTable,
};

/// チャット送信のユースケース
pub struct SendChatUseCase {
    sessions: Arc<SessionTable>,
    router: Arc<BroadcastRouter>,
    clock: Arc<dyn Clock>,
}

impl SendChatUseCase {
    pub fn new(sessions: Arc<SessionTable>, router: Arc<BroadcastRouter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions,
            router,
            clock,
        }
    }

    /// チャット送信を実行
    ///
    /// チャットは保存しない。ルームのチャット設定に関わらず送信できる。
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        payload: SendChatPayload,
    ) -> Result<ChatMessage, ActionError> {
        let session = self.sessions.joined(connection_id).await?;
        let message = MessageContent::new(payload.message)?;

        let now = Timestamp::new(self.clock.now_millis());
        let stamped = self.sessions.stamp_chat(connection_id, now).await?;
        let chat = ChatMessage {
            time: format_chat_time(stamped.value()),
            message,
            nickname: session.nickname,
            image_url: session.image_url,
        };

        self.router
            .emit(
                connection_id,
                Target::RoomExceptOrigin(session.room_id),
                &ServerEvent::ReceiveChat(chat.clone().into()),
            )
            .await;
        self.router
            .emit(
                connection_id,
                Target::Origin,
                &ServerEvent::ResponseChat(ChatAckPayload { success: true }),
            )
            .await;

        Ok(chat)
    }
}
