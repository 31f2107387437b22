//! WebSocket connection handlers.
//!
//! The upgrade always succeeds so that an auth rejection can be delivered as
//! an `error` frame before the socket is closed.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header::AUTHORIZATION},
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::ConnectionId,
    infrastructure::dto::websocket::ServerEvent,
    usecase::{ActionError, ConnectError, ConnectionQuery},
    ui::state::AppState,
};

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    pub room_id: Option<String>,
    pub nickname: Option<String>,
    pub image_url: Option<String>,
    /// `Bearer <jwt>`; falls back to the `Authorization` header
    pub token: Option<String>,
}

impl ConnectQuery {
    fn into_parts(self, headers: &HeaderMap) -> (Option<String>, ConnectionQuery) {
        let token = self.token.or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        });
        let query = ConnectionQuery {
            room_id: self.room_id,
            nickname: self.nickname,
            image_url: self.image_url,
        };
        (token, query)
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (token, query) = query.into_parts(&headers);
    ws.on_upgrade(move |socket| handle_socket(socket, state, token, query))
}

/// Forwards frames queued for this connection to its WebSocket sink.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Sends the rejection frame and closes the socket.
async fn reject(socket: &mut WebSocket, error: &ConnectError) {
    let event = match error {
        ConnectError::Auth(e) => ServerEvent::rejected(e),
        other => ServerEvent::failed(other),
    };
    match serde_json::to_string(&event) {
        Ok(frame) => {
            if let Err(e) = socket.send(Message::Text(frame.into())).await {
                tracing::warn!("Failed to send rejection: {}", e);
            }
        }
        Err(e) => tracing::error!("Failed to serialize rejection: {}", e),
    }
    if let Err(e) = socket.send(Message::Close(None)).await {
        tracing::debug!("Failed to close rejected socket: {}", e);
    }
}

async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    token: Option<String>,
    query: ConnectionQuery,
) {
    let connection_id = ConnectionId::generate();
    let (tx, rx) = mpsc::unbounded_channel();
    state
        .connect_participant_usecase
        .open(connection_id.clone(), tx)
        .await;

    // 1. 認証（失敗したら error を送って切断）
    if let Err(e) = state
        .connect_participant_usecase
        .authenticate(&connection_id, token.as_deref())
        .await
    {
        tracing::warn!("Rejected connection '{}': {}", connection_id.as_str(), e);
        reject(&mut socket, &e).await;
        disconnect(&state, &connection_id).await;
        return;
    }

    let (sender, mut receiver) = socket.split();
    let mut send_task = pusher_loop(rx, sender);

    // 2. ルームへの参加（失敗しても接続は保つ）
    if let Err(e) = state
        .connect_participant_usecase
        .join(&connection_id, query)
        .await
    {
        state.router.report_failure(&connection_id, &e).await;
    }

    // 3. アクションを 1 件ずつ順に処理
    let recv_state = state.clone();
    let recv_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", recv_id.as_str(), e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    // 失敗は送信元へ報告済み
                    let _ = recv_state
                        .action_dispatcher
                        .handle_frame(&recv_id, text.as_str())
                        .await;
                }
                Message::Binary(_) => {
                    let error =
                        ActionError::MalformedEvent("binary frames are not supported".to_string());
                    recv_state.router.report_failure(&recv_id, &error).await;
                }
                Message::Close(_) => {
                    tracing::debug!("Client '{}' requested close", recv_id.as_str());
                    break;
                }
                _ => {}
            }
        }
    });

    let send_finished_first = tokio::select! {
        _ = &mut recv_task => false,
        _ = &mut send_task => true,
    };
    if send_finished_first {
        // 処理中のアクションは中断しない
        if let Err(e) = recv_task.await {
            tracing::error!("Receive task for '{}' failed: {}", connection_id.as_str(), e);
        }
    } else {
        send_task.abort();
    }

    // 4. 退出
    disconnect(&state, &connection_id).await;
}

async fn disconnect(state: &AppState, connection_id: &ConnectionId) {
    match state
        .disconnect_participant_usecase
        .execute(connection_id)
        .await
    {
        Ok(outcome) => tracing::debug!("Disconnected '{}': {:?}", connection_id.as_str(), outcome),
        Err(e) => tracing::warn!(
            "Disconnected '{}' with errors: {}",
            connection_id.as_str(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_from_query_wins_over_header() {
        // テスト項目: クエリの token がヘッダーより優先される
        // given (前提条件):
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        let query = ConnectQuery {
            room_id: Some("room-1".to_string()),
            token: Some("Bearer query".to_string()),
            ..ConnectQuery::default()
        };

        // when (操作):
        let (token, query) = query.into_parts(&headers);

        // then (期待する結果):
        assert_eq!(token.as_deref(), Some("Bearer query"));
        assert_eq!(query.room_id.as_deref(), Some("room-1"));
    }

    #[test]
    fn test_token_falls_back_to_authorization_header() {
        // テスト項目: クエリに token が無ければ Authorization ヘッダーを使う
        // given (前提条件):
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header"));

        // when (操作):
        let (token, _) = ConnectQuery::default().into_parts(&headers);

        // then (期待する結果):
        assert_eq!(token.as_deref(), Some("Bearer header"));
    }

    #[test]
    fn test_query_uses_camel_case_names() {
        // テスト項目: クエリパラメータは camelCase で受け取る
        // when (操作):
        let query: ConnectQuery =
            serde_json::from_value(serde_json::json!({
                "roomId": "room-1",
                "nickname": "alice",
                "imageUrl": "https://img.example/a.png"
            }))
            .unwrap();

        // then (期待する結果):
        assert_eq!(query.room_id.as_deref(), Some("room-1"));
        assert_eq!(query.image_url.as_deref(), Some("https://img.example/a.png"));
        assert!(query.token.is_none());
    }
}
