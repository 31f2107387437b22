//! WebSocket event DTOs.
//!
//! Every frame is `{"event": "<name>", "data": <payload>}`; field names are
//! camelCase on the wire.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{AuthError, RunState, TimerAction};

// ========================================
// Client → Server
// ========================================

/// Inbound events, one variant per client action
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    ResponseUserInfo(ResponseUserInfoPayload),
    SendChat(SendChatPayload),
    Start(TimerPayload),
    Stop(TimerPayload),
    Change(TimerPayload),
    Update(TimerPayload),
    GetPlanner(GetPlannerPayload),
    CreatePlanner(CreatePlannerPayload),
    ModifyPlanner(ModifyPlannerPayload),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ResponseUserInfo(_) => "responseUserInfo",
            Self::SendChat(_) => "sendChat",
            Self::Start(_) => "start",
            Self::Stop(_) => "stop",
            Self::Change(_) => "change",
            Self::Update(_) => "update",
            Self::GetPlanner(_) => "getPlanner",
            Self::CreatePlanner(_) => "createPlanner",
            Self::ModifyPlanner(_) => "modifyPlanner",
        }
    }
}

/// A member's answer to `addMemberAndRequestUserInfo`, addressed to `socket_id`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseUserInfoPayload {
    pub socket_id: String,
    /// Arbitrary client state forwarded as-is
    #[serde(flatten)]
    pub state: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendChatPayload {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetPlannerPayload {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatePlannerPayload {
    pub date: NaiveDate,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyPlannerPayload {
    pub planner_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub total_time: Option<u64>,
}

// ========================================
// Server → Client
// ========================================

/// Outbound events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    GetRoomAndMyInfo(RoomAndMyInfo),
    AddMemberAndRequestUserInfo(MemberJoinedPayload),
    SubMember(MemberLeftPayload),
    ResponseUserInfo(UserInfoPayload),
    ReceiveChat(ChatPayload),
    ResponseChat(ChatAckPayload),
    ResponseTimer(TimerStatePayload),
    ResponseGetPlanner(Vec<PlannerDto>),
    ResponseCreatePlanner(PlannerDto),
    ResponseModifyPlanner(PlannerDto),
    JoinChat(ChatPresencePayload),
    LeaveChat(ChatPresencePayload),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetRoomAndMyInfo(_) => "getRoomAndMyInfo",
            Self::AddMemberAndRequestUserInfo(_) => "addMemberAndRequestUserInfo",
            Self::SubMember(_) => "subMember",
            Self::ResponseUserInfo(_) => "responseUserInfo",
            Self::ReceiveChat(_) => "receiveChat",
            Self::ResponseChat(_) => "responseChat",
            Self::ResponseTimer(_) => "responseTimer",
            Self::ResponseGetPlanner(_) => "responseGetPlanner",
            Self::ResponseCreatePlanner(_) => "responseCreatePlanner",
            Self::ResponseModifyPlanner(_) => "responseModifyPlanner",
            Self::JoinChat(_) => "joinChat",
            Self::LeaveChat(_) => "leaveChat",
            Self::Error(_) => "error",
        }
    }

    /// Error frame sent before closing an unauthenticated connection
    pub fn rejected(error: &AuthError) -> Self {
        Self::Error(ErrorPayload::Rejected {
            message: error.to_string(),
        })
    }

    /// Error frame for a failed action; the connection stays open
    pub fn failed(error: &impl fmt::Display) -> Self {
        Self::Error(ErrorPayload::Failed {
            error: error.to_string(),
        })
    }
}

/// Snapshot sent to a connection right after it joins
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAndMyInfo {
    pub title: String,
    pub notice: String,
    pub password: Option<String>,
    pub is_chat: bool,
    pub room_manager: String,
    pub current_member: Vec<String>,
    pub planner: Vec<PlannerDto>,
    pub total_time: u64,
    pub state: RunState,
    /// The joining connection's own id
    pub socket_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberJoinedPayload {
    pub nickname: String,
    pub image_url: String,
    pub total_time: u64,
    pub state: RunState,
    pub socket_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLeftPayload {
    pub nickname: String,
    pub socket_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoPayload {
    pub nickname: String,
    pub image_url: String,
    #[serde(flatten)]
    pub state: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub time: String,
    pub message: String,
    pub nickname: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAckPayload {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStatePayload {
    pub action: TimerAction,
    pub state: RunState,
    pub total_time: u64,
    pub planner_id: Option<String>,
    pub nickname: String,
    pub socket_id: String,
    /// The payload the actor sent, echoed for reconciliation
    pub payload: TimerPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerDto {
    pub id: String,
    pub date: String,
    pub content: String,
    pub owner: String,
    pub nickname: String,
    pub completed: bool,
    pub total_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPresencePayload {
    pub nickname: String,
    pub time: String,
}

/// `error` payload: `{message}` for auth rejections, `{error}` otherwise
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Rejected { message: String },
    Failed { error: String },
}
