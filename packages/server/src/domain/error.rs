//! ドメイン層のエラー定義

use thiserror::Error;

use super::{entity::TimerAction, entity::RunState, session::ConnectionPhase};

/// 値オブジェクト生成時のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

/// Room エンティティ上の不正な操作
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("cannot {action} the timer while it is {state}")]
    InvalidTimerTransition { action: TimerAction, state: RunState },
    #[error("{0} is required for this action")]
    MissingField(&'static str),
}

/// Room Registry のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("room '{0}' not found")]
    RoomNotFound(String),
    #[error("member '{0}' not found in room")]
    MemberNotFound(String),
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// メッセージ送信のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("client '{0}' not found")]
    ClientNotFound(String),
    #[error("push failed: {0}")]
    PushFailed(String),
}

/// 認証エラー（致命的：接続を閉じる）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing or invalid token")]
    MissingOrMalformedCredential,
    #[error("Invalid token")]
    InvalidCredential(String),
}

/// 外部データアクセス層のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataAccessError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("data store unavailable: {0}")]
    Unavailable(String),
}

/// 接続状態機械の不正な遷移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal connection transition {from:?} -> {to:?}")]
pub struct PhaseError {
    pub from: ConnectionPhase,
    pub to: ConnectionPhase,
}
