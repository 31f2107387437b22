//! UseCase: 共有プランナー
//!
//! 永続化は外部データアクセス層が行い、成功した結果だけをルームの
//! キャッシュへ反映してから全員に通知する。

use std::sync::Arc;

use chrono::NaiveDate;
use studyroom_shared::time::Clock;

use crate::{
    domain::{ConnectionId, PlannerEntry, RoomRepository, SessionStore, Timestamp},
    infrastructure::dto::websocket::{CreatePlannerPayload, ModifyPlannerPayload, ServerEvent},
};

use super::{
    broadcast_router::{BroadcastRouter, Target},
    error::ActionError,
    session_table::SessionTable,
};

pub struct PlannerUseCase {
    repository: Arc<dyn RoomRepository>,
    session_store: Arc<dyn SessionStore>,
    sessions: Arc<SessionTable>,
    router: Arc<BroadcastRouter>,
    clock: Arc<dyn Clock>,
}

impl PlannerUseCase {
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

    /// 指定日のプランナーを取得し、ルーム全員に送る
    pub async fn get(
        &self,
        connection_id: &ConnectionId,
        date: NaiveDate,
    ) -> Result<Vec<PlannerEntry>, ActionError> {
        let session = self.sessions.joined(connection_id).await?;
        let entries = self
            .session_store
            .get_planner(&session.room_id, date)
            .await?;

        self.router
            .emit(
                connection_id,
                Target::Room(session.room_id),
                &ServerEvent::ResponseGetPlanner(
                    entries.iter().cloned().map(Into::into).collect(),
                ),
            )
            .await;
        Ok(entries)
    }

    /// プランナー項目を作成
    pub async fn create(
        &self,
        connection_id: &ConnectionId,
        payload: CreatePlannerPayload,
    ) -> Result<PlannerEntry, ActionError> {
        let session = self.sessions.joined(connection_id).await?;
        let room_id = &session.room_id;
        let _guard = self.repository.lock_room(room_id).await;

        let entry = self
            .session_store
            .create_planner(
                room_id,
                &session.identity,
                session.nickname.as_str(),
                payload.into(),
            )
            .await?;
        self.repository
            .upsert_planner(room_id, entry.clone(), self.now())
            .await?;

        self.router
            .emit(
                connection_id,
                Target::Room(room_id.clone()),
                &ServerEvent::ResponseCreatePlanner(entry.clone().into()),
            )
            .await;
        Ok(entry)
    }

    /// プランナー項目を変更（作成者のみ）
    pub async fn modify(
        &self,
        connection_id: &ConnectionId,
        payload: ModifyPlannerPayload,
    ) -> Result<PlannerEntry, ActionError> {
        let session = self.sessions.joined(connection_id).await?;
        let room_id = &session.room_id;
        let _guard = self.repository.lock_room(room_id).await;

        let entry = self
            .session_store
            .modify_planner(room_id, &session.identity, payload.into())
            .await?;
        self.repository
            .upsert_planner(room_id, entry.clone(), self.now())
            .await?;

        self.router
            .emit(
                connection_id,
                Target::Room(room_id.clone()),
                &ServerEvent::ResponseModifyPlanner(entry.clone().into()),
            )
            .await;
        Ok(entry)
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }
}
