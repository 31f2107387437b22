//! 接続ごとのセッション記録
//!
//! 接続 ID をキーに Connection Lifecycle Manager が保持する。各フィールドは
//! 状態遷移と一緒に設定され、途中までしか埋まっていない記録を外から
//! 読めないよう `JoinedSession` として参加完了後のビューを提供する。

use super::{
    entity::Identity,
    error::PhaseError,
    value_object::{ConnectionId, ImageUrl, Nickname, RoomId, Timestamp},
};

/// 接続の状態機械
///
/// ```text
/// Connecting → Authenticating → Authenticated → Joining → Joined → Leaving → Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Authenticating,
    Authenticated,
    Joining,
    Joined,
    Leaving,
    Closed,
}

impl ConnectionPhase {
    pub fn can_advance_to(self, next: ConnectionPhase) -> bool {
        use ConnectionPhase::*;

        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Authenticating, Authenticated)
                | (Authenticated, Joining)
                | (Joining, Joined)
                // 参加前に失敗した場合は接続を保ったまま戻る
                | (Joining, Authenticated)
                | (Authenticated | Joining | Joined, Leaving)
                | (Connecting | Authenticating | Authenticated | Joining | Joined | Leaving, Closed)
        )
    }

    pub fn advance(self, next: ConnectionPhase) -> Result<ConnectionPhase, PhaseError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(PhaseError {
                from: self,
                to: next,
            })
        }
    }
}

/// 接続時のクエリから得る、接続ごとの読み取り専用コンテキスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    pub room_id: RoomId,
    pub nickname: Nickname,
    pub image_url: ImageUrl,
}

/// 接続 1 本分の記録
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSession {
    pub connection_id: ConnectionId,
    pub phase: ConnectionPhase,
    pub identity: Option<Identity>,
    pub context: Option<ConnectionContext>,
    /// ルームのメンバーとして登録済みか
    pub in_room: bool,
    /// 直前に送ったチャットの時刻
    pub last_chat_at: Option<Timestamp>,
}

impl ConnectionSession {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            phase: ConnectionPhase::Connecting,
            identity: None,
            context: None,
            in_room: false,
            last_chat_at: None,
        }
    }

    /// 参加完了後のビュー。参加が完了していなければ `None`。
    pub fn joined(&self) -> Option<JoinedSession> {
        if self.phase != ConnectionPhase::Joined {
            return None;
        }
        let identity = self.identity.clone()?;
        let context = self.context.clone()?;
        Some(JoinedSession {
            connection_id: self.connection_id.clone(),
            identity,
            room_id: context.room_id,
            nickname: context.nickname,
            image_url: context.image_url,
        })
    }

    /// 送信時刻を決める。同じ接続からの時刻は前回より前にならない。
    pub fn stamp_chat(&mut self, now: Timestamp) -> Timestamp {
        let stamped = match self.last_chat_at {
            Some(last) if now <= last => Timestamp::new(last.value() + 1),
            _ => now,
        };
        self.last_chat_at = Some(stamped);
        stamped
    }
}

/// 参加完了済みの接続
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedSession {
    pub connection_id: ConnectionId,
    pub identity: Identity,
    pub room_id: RoomId,
    pub nickname: Nickname,
    pub image_url: ImageUrl,
}
