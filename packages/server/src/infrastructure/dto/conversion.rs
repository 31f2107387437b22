//! Conversion logic between DTOs and domain types.

use crate::domain::{
    ChatMessage, ConnectionId, PlannerChange, PlannerDraft, PlannerEntry, RoomSnapshot,
    TimerAction, TimerCommand,
};
use crate::infrastructure::dto::websocket as dto;

// ========================================
// DTO → Domain
// ========================================

impl From<dto::CreatePlannerPayload> for PlannerDraft {
    fn from(dto: dto::CreatePlannerPayload) -> Self {
        Self {
            date: dto.date,
            content: dto.content,
        }
    }
}

impl From<dto::ModifyPlannerPayload> for PlannerChange {
    fn from(dto: dto::ModifyPlannerPayload) -> Self {
        Self {
            planner_id: dto.planner_id,
            content: dto.content,
            date: dto.date,
            completed: dto.completed,
            total_time: dto.total_time,
        }
    }
}

impl dto::TimerPayload {
    pub fn to_command(&self, action: TimerAction) -> TimerCommand {
        TimerCommand {
            action,
            planner_id: self.planner_id.clone(),
            total_time: self.total_time,
        }
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<PlannerEntry> for dto::PlannerDto {
    fn from(model: PlannerEntry) -> Self {
        Self {
            id: model.id,
            date: model.date.format("%Y-%m-%d").to_string(),
            content: model.content,
            owner: model.owner,
            nickname: model.nickname,
            completed: model.completed,
            total_time: model.total_time,
        }
    }
}

impl From<ChatMessage> for dto::ChatPayload {
    fn from(model: ChatMessage) -> Self {
        Self {
            time: model.time,
            message: model.message.into_string(),
            nickname: model.nickname.into_string(),
            image_url: model.image_url.into_string(),
        }
    }
}

impl dto::RoomAndMyInfo {
    pub fn from_snapshot(snapshot: RoomSnapshot, connection_id: &ConnectionId) -> Self {
        Self {
            title: snapshot.title,
            notice: snapshot.notice,
            password: snapshot.password,
            is_chat: snapshot.is_chat,
            room_manager: snapshot.room_manager,
            current_member: snapshot.current_member,
            planner: snapshot.planner.into_iter().map(Into::into).collect(),
            total_time: snapshot.total_time,
            state: snapshot.run_state,
            socket_id: connection_id.as_str().to_string(),
        }
    }
}
