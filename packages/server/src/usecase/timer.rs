//! UseCase: 共有タイマー操作
//!
//! ルームのゲートを保持したまま「読み込み → 遷移 → 保存 → 反映 → 通知」を行う。
//! 保存に失敗した場合、メモリ上の状態は変更しない。

use std::sync::Arc;

use studyroom_shared::time::Clock;

use crate::{
    domain::{ConnectionId, RoomRepository, SessionStore, TimerAction, TimerState, Timestamp},
    infrastructure::dto::websocket::{ServerEvent, TimerPayload, TimerStatePayload},
};

use super::{
    broadcast_router::{BroadcastRouter, Target},
    error::ActionError,
    session_table::SessionTable,
};

pub struct TimerUseCase {
    repository: Arc<dyn RoomRepository>,
    session_store: Arc<dyn SessionStore>,
    sessions: Arc<SessionTable>,
    router: Arc<BroadcastRouter>,
    clock: Arc<dyn Clock>,
}

impl TimerUseCase {
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        session_store: Arc<dyn SessionStore>,
        sessions: Arc<SessionTable>,
        router: Arc<BroadcastRouter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            session_store,
            sessions,
            router,
            clock,
        }
    }

    /// タイマー操作を実行し、適用後の状態を返す
    ///
    /// # Returns
    ///
    /// * `Ok(TimerState)` - 適用後の状態（ルーム全員に `responseTimer` を送信済み）
    /// * `Err(ActionError::Room)` - 現在の状態では許されない操作、または必須項目の欠落
    /// * `Err(ActionError::DataAccess)` - 保存に失敗（状態は変わらない）
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        action: TimerAction,
        payload: TimerPayload,
    ) -> Result<TimerState, ActionError> {
        let session = self.sessions.joined(connection_id).await?;
        let room_id = &session.room_id;
        let _guard = self.repository.lock_room(room_id).await;
        let now = Timestamp::new(self.clock.now_millis());

        let room = self.repository.get_room(room_id).await?;
        let next = room.timer.apply(&payload.to_command(action), now)?;

        self.session_store
            .record_timer(room_id, &session.identity.subject, action, &next, now)
            .await?;
        self.repository.replace_timer(room_id, next.clone()).await?;

        tracing::debug!(
            "Timer {} in room '{}' by '{}' ({})",
            action,
            room_id.as_str(),
            session.nickname.as_str(),
            next.run_state
        );

        self.router
            .emit(
                connection_id,
                Target::Room(room_id.clone()),
                &ServerEvent::ResponseTimer(TimerStatePayload {
                    action,
                    state: next.run_state,
                    total_time: next.total_at(now),
                    planner_id: next.planner_id.clone(),
                    nickname: session.nickname.as_str().to_string(),
                    socket_id: connection_id.as_str().to_string(),
                    payload,
                }),
            )
            .await;

        Ok(next)
    }
}
