//! 接続ごとのセッション記録の表
//!
//! 状態遷移は必ず `ConnectionPhase::advance` を通し、遷移と同時に
//! 対応するフィールド（身元情報・コンテキスト）を設定する。

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::{
    ConnectionContext, ConnectionId, ConnectionPhase, ConnectionSession, Identity, JoinedSession,
    Timestamp,
};

use super::error::{ActionError, ConnectError};

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<ConnectionId, ConnectionSession>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しい接続を `Connecting` で登録
    pub async fn open(&self, connection_id: ConnectionId) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(connection_id.clone(), ConnectionSession::new(connection_id));
    }

    /// 状態だけを遷移させる
    pub async fn advance(
        &self,
        connection_id: &ConnectionId,
        next: ConnectionPhase,
    ) -> Result<(), ConnectError> {
        self.update(connection_id, |session| {
            session.phase = session.phase.advance(next)?;
            Ok(())
        })
        .await
    }

    /// `Authenticating → Authenticated` と同時に身元情報を設定
    pub async fn authenticate(
        &self,
        connection_id: &ConnectionId,
        identity: Identity,
    ) -> Result<(), ConnectError> {
        self.update(connection_id, |session| {
            session.phase = session.phase.advance(ConnectionPhase::Authenticated)?;
            session.identity = Some(identity);
            Ok(())
        })
        .await
    }

    /// `Authenticated → Joining` と同時にコンテキストを設定
    pub async fn begin_join(
        &self,
        connection_id: &ConnectionId,
        context: ConnectionContext,
    ) -> Result<(), ConnectError> {
        self.update(connection_id, |session| {
            session.phase = session.phase.advance(ConnectionPhase::Joining)?;
            session.context = Some(context);
            Ok(())
        })
        .await
    }

    /// 参加処理を終える
    ///
    /// ルームへ登録済みなら `Joined`、登録前に失敗していれば `Authenticated` に戻る。
    pub async fn finish_join(
        &self,
        connection_id: &ConnectionId,
        in_room: bool,
    ) -> Result<(), ConnectError> {
        self.update(connection_id, |session| {
            let next = if in_room {
                ConnectionPhase::Joined
            } else {
                ConnectionPhase::Authenticated
            };
            session.phase = session.phase.advance(next)?;
            session.in_room = in_room;
            Ok(())
        })
        .await
    }

    /// 退出処理を始め、その時点の記録を返す
    ///
    /// `Leaving` に遷移できない状態（未認証など）では状態を変えずに記録だけ返す。
    pub async fn begin_leave(&self, connection_id: &ConnectionId) -> Option<ConnectionSession> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(connection_id)?;
        if session.phase.can_advance_to(ConnectionPhase::Leaving) {
            session.phase = ConnectionPhase::Leaving;
        }
        Some(session.clone())
    }

    /// `Closed` にして表から取り除く
    pub async fn close(&self, connection_id: &ConnectionId) -> Option<ConnectionSession> {
        let mut sessions = self.sessions.lock().await;
        let mut session = sessions.remove(connection_id)?;
        session.phase = ConnectionPhase::Closed;
        Some(session)
    }

    pub async fn get(&self, connection_id: &ConnectionId) -> Option<ConnectionSession> {
        self.sessions.lock().await.get(connection_id).cloned()
    }

    /// 参加完了済みのセッションを取得
    pub async fn joined(&self, connection_id: &ConnectionId) -> Result<JoinedSession, ActionError> {
        self.sessions
            .lock()
            .await
            .get(connection_id)
            .and_then(ConnectionSession::joined)
            .ok_or(ActionError::NotJoined)
    }

    /// チャットの送信時刻を決める
    pub async fn stamp_chat(
        &self,
        connection_id: &ConnectionId,
        now: Timestamp,
    ) -> Result<Timestamp, ActionError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(connection_id)
            .ok_or(ActionError::NotJoined)?;
        Ok(session.stamp_chat(now))
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn update<F>(&self, connection_id: &ConnectionId, f: F) -> Result<(), ConnectError>
    where
        F: FnOnce(&mut ConnectionSession) -> Result<(), ConnectError>,
    {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(connection_id)
            .ok_or_else(|| ConnectError::UnknownConnection(connection_id.as_str().to_string()))?;
        f(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImageUrl, Nickname, PhaseError, RoomId};
    use serde_json::Map;

    fn identity() -> Identity {
        Identity {
            subject: "user-1".to_string(),
            claims: Map::new(),
        }
    }

    fn context() -> ConnectionContext {
        ConnectionContext {
            room_id: RoomId::new("room-1".to_string()).unwrap(),
            nickname: Nickname::new("alice".to_string()).unwrap(),
            image_url: ImageUrl::default(),
        }
    }

    async fn authenticated_table(id: &ConnectionId) -> SessionTable {
        let table = SessionTable::new();
        table.open(id.clone()).await;
        table
            .advance(id, ConnectionPhase::Authenticating)
            .await
            .unwrap();
        table.authenticate(id, identity()).await.unwrap();
        table
    }

    #[tokio::test]
    async fn test_join_flow_exposes_joined_session() {
        // テスト項目: 参加が完了した接続だけが JoinedSession を返す
        // given (前提条件):
        let id = ConnectionId::generate();
        let table = authenticated_table(&id).await;
        table.begin_join(&id, context()).await.unwrap();
        assert_eq!(table.joined(&id).await, Err(ActionError::NotJoined));

        // when (操作):
        table.finish_join(&id, true).await.unwrap();

        // then (期待する結果):
        let joined = table.joined(&id).await.unwrap();
        assert_eq!(joined.identity.subject, "user-1");
        assert_eq!(joined.room_id.as_str(), "room-1");
        assert_eq!(joined.nickname.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_failed_join_returns_to_authenticated() {
        // テスト項目: ルーム登録前に失敗した参加は Authenticated に戻る
        // given (前提条件):
        let id = ConnectionId::generate();
        let table = authenticated_table(&id).await;
        table.begin_join(&id, context()).await.unwrap();

        // when (操作):
        table.finish_join(&id, false).await.unwrap();

        // then (期待する結果):
        let session = table.get(&id).await.unwrap();
        assert_eq!(session.phase, ConnectionPhase::Authenticated);
        assert!(!session.in_room);
        assert_eq!(table.joined(&id).await, Err(ActionError::NotJoined));
    }

    #[tokio::test]
    async fn test_join_before_authentication_is_rejected() {
        // テスト項目: 認証前に参加を始めることはできない
        // given (前提条件):
        let id = ConnectionId::generate();
        let table = SessionTable::new();
        table.open(id.clone()).await;

        // when (操作):
        let result = table.begin_join(&id, context()).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConnectError::Phase(PhaseError {
                from: ConnectionPhase::Connecting,
                to: ConnectionPhase::Joining,
            }))
        );
        assert!(table.get(&id).await.unwrap().context.is_none());
    }

    #[tokio::test]
    async fn test_unknown_connection() {
        // テスト項目: 未登録の接続に対する操作はエラーになる
        // given (前提条件):
        let table = SessionTable::new();
        let id = ConnectionId::generate();

        // when (操作):
        let result = table.advance(&id, ConnectionPhase::Authenticating).await;

        // then (期待する結果):
        assert!(matches!(result, Err(ConnectError::UnknownConnection(_))));
        assert!(table.begin_leave(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_begin_leave_keeps_unauthenticated_phase() {
        // テスト項目: 未認証の接続は Leaving に遷移せず、記録だけ返る
        // given (前提条件):
        let id = ConnectionId::generate();
        let table = SessionTable::new();
        table.open(id.clone()).await;
        table
            .advance(&id, ConnectionPhase::Authenticating)
            .await
            .unwrap();

        // when (操作):
        let session = table.begin_leave(&id).await.unwrap();

        // then (期待する結果):
        assert_eq!(session.phase, ConnectionPhase::Authenticating);
        assert!(session.identity.is_none());
    }

    #[tokio::test]
    async fn test_close_removes_session() {
        // テスト項目: close で表から取り除かれ Closed の記録が返る
        // given (前提条件):
        let id = ConnectionId::generate();
        let table = authenticated_table(&id).await;
        table.begin_leave(&id).await.unwrap();

        // when (操作):
        let closed = table.close(&id).await.unwrap();

        // then (期待する結果):
        assert_eq!(closed.phase, ConnectionPhase::Closed);
        assert_eq!(table.count().await, 0);
    }

    #[tokio::test]
    async fn test_stamp_chat_is_monotonic() {
        // テスト項目: 同じ時刻に連続で送っても時刻は単調増加する
        // given (前提条件):
        let id = ConnectionId::generate();
        let table = authenticated_table(&id).await;
        let now = Timestamp::new(1_000);

        // when (操作):
        let first = table.stamp_chat(&id, now).await.unwrap();
        let second = table.stamp_chat(&id, now).await.unwrap();

        // then (期待する結果):
        assert_eq!(first, Timestamp::new(1_000));
        assert_eq!(second, Timestamp::new(1_001));
    }
}
