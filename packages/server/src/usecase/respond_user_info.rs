//! UseCase: 参加者情報の返信
//!
//! 既存メンバーが新しい参加者からの `addMemberAndRequestUserInfo` に答え、
//! 自分の状態をその参加者だけに送る。

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    domain::ConnectionId,
    infrastructure::dto::websocket::{ResponseUserInfoPayload, ServerEvent, UserInfoPayload},
};

use super::{
    broadcast_router::{BroadcastRouter, Target},
    error::ActionError,
    session_table::SessionTable,
};

pub struct RespondUserInfoUseCase {
    sessions: Arc<SessionTable>,
    router: Arc<BroadcastRouter>,
}

impl RespondUserInfoUseCase {
    pub fn new(sessions: Arc<SessionTable>, router: Arc<BroadcastRouter>) -> Self {
        Self { sessions, router }
    }

    /// 送信者の情報を `socket_id` の接続に届け、届いた数を返す
    ///
    /// 宛先が送信者と同じルームにいなければ何も送らない。
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        payload: ResponseUserInfoPayload,
    ) -> Result<usize, ActionError> {
        let session = self.sessions.joined(connection_id).await?;
        let peer = ConnectionId::new(payload.socket_id)?;

        // クライアントが送った表示名とアイコンを優先する
        let mut state = payload.state;
        let nickname = take_string(&mut state, "nickname")
            .unwrap_or_else(|| session.nickname.into_string());
        let image_url = take_string(&mut state, "imageUrl")
            .unwrap_or_else(|| session.image_url.into_string());

        let delivered = self
            .router
            .emit(
                connection_id,
                Target::Peer {
                    room_id: session.room_id,
                    connection_id: peer,
                },
                &ServerEvent::ResponseUserInfo(UserInfoPayload {
                    nickname,
                    image_url,
                    state,
                }),
            )
            .await;
        Ok(delivered)
    }
}

/// キーを取り除き、文字列ならその値を返す
fn take_string(state: &mut Map<String, Value>, key: &str) -> Option<String> {
    match state.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}
