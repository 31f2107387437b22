//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{
    AuthError, DataAccessError, PhaseError, RepositoryError, RoomError, ValueObjectError,
};

/// 接続（認証・参加）のエラー
///
/// `Auth` だけが致命的で、接続を閉じる。それ以外は接続を保ったまま報告する。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid connection query: {0}")]
    InvalidQuery(#[from] ValueObjectError),
    #[error("connection '{0}' is not registered")]
    UnknownConnection(String),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ConnectError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// 参加後のアクションのエラー（送信元にのみ報告する）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("connection has not joined a room")]
    NotJoined,
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ValueObjectError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

/// 退出処理中のエラー（退出自体は最後まで実行される）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisconnectError {
    #[error("failed to save connection state: {0}")]
    Persist(DataAccessError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
