//! UseCase: 受信イベントの振り分け
//!
//! 1 つの接続から届いたフレームは、呼び出し側が 1 件ずつ順番に渡す。
//! 失敗は送信元にだけ `error` イベントとして返し、接続は保つ。

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, TimerAction},
    infrastructure::dto::websocket::ClientEvent,
};

use super::{
    broadcast_router::BroadcastRouter, error::ActionError, planner::PlannerUseCase,
    respond_user_info::RespondUserInfoUseCase, send_chat::SendChatUseCase, timer::TimerUseCase,
};

pub struct ActionDispatcher {
    send_chat: SendChatUseCase,
    respond_user_info: RespondUserInfoUseCase,
    timer: TimerUseCase,
    planner: PlannerUseCase,
    router: Arc<BroadcastRouter>,
}

impl ActionDispatcher {
    pub fn new(
        send_chat: SendChatUseCase,
        respond_user_info: RespondUserInfoUseCase,
        timer: TimerUseCase,
        planner: PlannerUseCase,
        router: Arc<BroadcastRouter>,
    ) -> Self {
        Self {
            send_chat,
            respond_user_info,
            timer,
            planner,
            router,
        }
    }

    /// テキストフレームを解釈して処理し、失敗は送信元に報告する
    pub async fn handle_frame(
        &self,
        connection_id: &ConnectionId,
        text: &str,
    ) -> Result<(), ActionError> {
        let result = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => {
                tracing::debug!("'{}' from '{}'", event.name(), connection_id.as_str());
                self.dispatch(connection_id, event).await
            }
            Err(e) => Err(ActionError::MalformedEvent(e.to_string())),
        };

        if let Err(e) = &result {
            self.router.report_failure(connection_id, e).await;
        }
        result
    }

    /// イベントを対応するユースケースへ渡す
    pub async fn dispatch(
        &self,
        connection_id: &ConnectionId,
        event: ClientEvent,
    ) -> Result<(), ActionError> {
        match event {
            ClientEvent::ResponseUserInfo(payload) => {
                self.respond_user_info
                    .execute(connection_id, payload)
                    .await?;
            }
            ClientEvent::SendChat(payload) => {
                self.send_chat.execute(connection_id, payload).await?;
            }
            ClientEvent::Start(payload) => {
                self.timer
                    .execute(connection_id, TimerAction::Start, payload)
                    .await?;
            }
            ClientEvent::Stop(payload) => {
                self.timer
                    .execute(connection_id, TimerAction::Stop, payload)
                    .await?;
            }
            ClientEvent::Change(payload) => {
                self.timer
                    .execute(connection_id, TimerAction::Change, payload)
                    .await?;
            }
            ClientEvent::Update(payload) => {
                self.timer
                    .execute(connection_id, TimerAction::Update, payload)
                    .await?;
            }
            ClientEvent::GetPlanner(payload) => {
                self.planner.get(connection_id, payload.date).await?;
            }
            ClientEvent::CreatePlanner(payload) => {
                self.planner.create(connection_id, payload).await?;
            }
            ClientEvent::ModifyPlanner(payload) => {
                self.planner.modify(connection_id, payload).await?;
            }
        }
        Ok(())
    }
}
