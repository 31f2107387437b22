//! エンティティ
//!
//! Room を集約ルートとし、メンバー・タイマー・プランナーのキャッシュを保持します。

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use studyroom_shared::time::date_of;

use super::{
    error::RoomError,
    value_object::{ConnectionId, ImageUrl, MessageContent, Nickname, RoomId, Timestamp},
};

/// 認証済みの身元情報（トークンのペイロード）
///
/// 認証成功時に一度だけ接続に紐づけられ、以後は変更されない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// `sub` クレーム
    pub subject: String,
    /// `sub` 以外のクレーム
    pub claims: Map<String, Value>,
}

/// ルームに参加中のメンバー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub nickname: Nickname,
    pub image_url: ImageUrl,
    pub joined_at: Timestamp,
}

/// 外部データアクセス層が管理するルームの設定
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomProfile {
    pub title: String,
    pub notice: String,
    pub password: Option<String>,
    pub is_chat: bool,
    pub room_manager: String,
}

/// タイマーの実行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[serde(rename = "start")]
    Running,
    #[default]
    #[serde(rename = "stop")]
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// タイマー操作の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Stop,
    Change,
    Update,
}

impl fmt::Display for TimerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Change => "change",
            Self::Update => "update",
        };
        f.write_str(name)
    }
}

/// タイマー操作の要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerCommand {
    pub action: TimerAction,
    pub planner_id: Option<String>,
    pub total_time: Option<u64>,
}

/// ルームで共有されるタイマー状態
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimerState {
    pub run_state: RunState,
    /// 確定済みの合計時間（秒）
    pub total_time: u64,
    pub started_at: Option<Timestamp>,
    /// 計測中のプランナー項目
    pub planner_id: Option<String>,
}

impl TimerState {
    /// 操作を適用した次の状態を返す（自身は変更しない）
    pub fn apply(&self, command: &TimerCommand, now: Timestamp) -> Result<TimerState, RoomError> {
        let mut next = self.clone();
        match (command.action, self.run_state) {
            (TimerAction::Start, RunState::Stopped) => {
                next.run_state = RunState::Running;
                next.started_at = Some(now);
                if command.planner_id.is_some() {
                    next.planner_id = command.planner_id.clone();
                }
            }
            (TimerAction::Stop, RunState::Running) => {
                next.total_time = self.total_at(now);
                next.run_state = RunState::Stopped;
                next.started_at = None;
            }
            (TimerAction::Change, RunState::Running) => {
                let planner_id = command
                    .planner_id
                    .clone()
                    .ok_or(RoomError::MissingField("plannerId"))?;
                next.total_time = self.total_at(now);
                next.started_at = Some(now);
                next.planner_id = Some(planner_id);
            }
            (TimerAction::Update, run_state) => {
                next.total_time = command
                    .total_time
                    .ok_or(RoomError::MissingField("totalTime"))?;
                if run_state == RunState::Running {
                    next.started_at = Some(now);
                }
            }
            (action, state) => return Err(RoomError::InvalidTimerTransition { action, state }),
        }
        Ok(next)
    }

    /// `now` 時点までの経過を含めた合計時間（秒）
    pub fn total_at(&self, now: Timestamp) -> u64 {
        match (self.run_state, self.started_at) {
            (RunState::Running, Some(started_at)) => {
                self.total_time + now.seconds_since(started_at)
            }
            _ => self.total_time,
        }
    }
}

/// プランナーの項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerEntry {
    pub id: String,
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub content: String,
    /// 作成者の `sub`
    pub owner: String,
    pub nickname: String,
    pub completed: bool,
    pub total_time: u64,
}

impl PlannerEntry {
    pub fn apply_change(&mut self, change: &PlannerChange) {
        if let Some(content) = &change.content {
            self.content = content.clone();
        }
        if let Some(date) = change.date {
            self.date = date;
        }
        if let Some(completed) = change.completed {
            self.completed = completed;
        }
        if let Some(total_time) = change.total_time {
            self.total_time = total_time;
        }
    }
}

/// プランナー項目の作成要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerDraft {
    pub date: NaiveDate,
    pub content: String,
}

/// プランナー項目の変更要求
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlannerChange {
    pub planner_id: String,
    pub content: Option<String>,
    pub date: Option<NaiveDate>,
    pub completed: Option<bool>,
    pub total_time: Option<u64>,
}

/// ルームを新規作成するときの初期値
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomSeed {
    pub profile: RoomProfile,
    /// 当日分のプランナー
    pub planner: Vec<PlannerEntry>,
    /// 最後に保存されたタイマーの合計時間（秒）
    pub total_time: u64,
}

/// 参加直後の接続に送るルーム全体の状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub title: String,
    pub notice: String,
    pub password: Option<String>,
    pub is_chat: bool,
    pub room_manager: String,
    /// 参加順の表示名
    pub current_member: Vec<String>,
    pub planner: Vec<PlannerEntry>,
    pub total_time: u64,
    pub run_state: RunState,
}

/// ルーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub profile: RoomProfile,
    pub members: Vec<Member>,
    pub timer: TimerState,
    pub planner: Vec<PlannerEntry>,
    pub created_at: Timestamp,
}

impl Room {
    pub fn new(id: RoomId, seed: RoomSeed, created_at: Timestamp) -> Self {
        Self {
            id,
            profile: seed.profile,
            members: Vec::new(),
            timer: TimerState {
                total_time: seed.total_time,
                ..TimerState::default()
            },
            planner: seed.planner,
            created_at,
        }
    }

    /// メンバーを追加する。同じ接続 ID が既にいれば何もせず `false` を返す。
    pub fn add_member(&mut self, member: Member) -> bool {
        if self.contains(&member.connection_id) {
            return false;
        }
        self.members.push(member);
        true
    }

    pub fn remove_member(&mut self, connection_id: &ConnectionId) -> Option<Member> {
        let index = self
            .members
            .iter()
            .position(|m| &m.connection_id == connection_id)?;
        Some(self.members.remove(index))
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members.iter().any(|m| &m.connection_id == connection_id)
    }

    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.members.iter().map(|m| m.connection_id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// 当日分のキャッシュへ項目を反映する
    pub fn upsert_planner(&mut self, entry: PlannerEntry, today: NaiveDate) {
        self.planner.retain(|cached| cached.id != entry.id);
        if entry.date == today {
            self.planner.push(entry);
        }
    }

    pub fn snapshot(&self, now: Timestamp) -> RoomSnapshot {
        let today = date_of(now.value());
        RoomSnapshot {
            title: self.profile.title.clone(),
            notice: self.profile.notice.clone(),
            password: self.profile.password.clone(),
            is_chat: self.profile.is_chat,
            room_manager: self.profile.room_manager.clone(),
            current_member: self
                .members
                .iter()
                .map(|m| m.nickname.as_str().to_string())
                .collect(),
            planner: self
                .planner
                .iter()
                .filter(|entry| entry.date == today)
                .cloned()
                .collect(),
            total_time: self.timer.total_at(now),
            run_state: self.timer.run_state,
        }
    }
}

/// チャットメッセージ（永続化しない）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub time: String,
    pub message: MessageContent,
    pub nickname: Nickname,
    pub image_url: ImageUrl,
}

/// 切断時に外部データアクセス層へ保存する状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStateRecord {
    pub connection_id: ConnectionId,
    pub room_id: RoomId,
    pub subject: String,
    pub nickname: Nickname,
    pub total_time: u64,
    pub disconnected_at: Timestamp,
}
