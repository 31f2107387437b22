//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use studyroom_shared::time::Clock;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    domain::{IdentityProvider, MessagePusher, RoomRepository, SessionStore},
    infrastructure::message_pusher::WebSocketMessagePusher,
    usecase::{
        ActionDispatcher, BroadcastRouter, ConnectParticipantUseCase,
        DisconnectParticipantUseCase, PlannerUseCase, RespondUserInfoUseCase, SendChatUseCase,
        SessionTable, TimerUseCase, TokenValidator,
    },
};

use super::{
    handler::{health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Study room server
///
/// # Example
///
/// ```ignore
/// let server = Server::assemble(repository, session_store, identity_provider, clock);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    /// ConnectParticipantUseCase（認証・参加のユースケース）
    connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    /// DisconnectParticipantUseCase（退出のユースケース）
    disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    /// ActionDispatcher（参加後のアクション）
    action_dispatcher: Arc<ActionDispatcher>,
    /// BroadcastRouter（配送と失敗の報告）
    router: Arc<BroadcastRouter>,
}

impl Server {
    pub fn new(
        connect_participant_usecase: Arc<ConnectParticipantUseCase>,
        disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
        action_dispatcher: Arc<ActionDispatcher>,
        router: Arc<BroadcastRouter>,
    ) -> Self {
        Self {
            connect_participant_usecase,
            disconnect_participant_usecase,
            action_dispatcher,
            router,
        }
    }

    /// Wire every UseCase on top of the given ports
    ///
    /// Dependencies are created in order:
    /// 1. MessagePusher and session table
    /// 2. BroadcastRouter
    /// 3. UseCases
    pub fn assemble(
        repository: Arc<dyn RoomRepository>,
        session_store: Arc<dyn SessionStore>,
        identity_provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // 1. MessagePusher (WebSocket implementation) and session table
        let message_pusher: Arc<dyn MessagePusher> = Arc::new(WebSocketMessagePusher::new());
        let sessions = Arc::new(SessionTable::new());

        // 2. BroadcastRouter
        let router = Arc::new(BroadcastRouter::new(
            repository.clone(),
            message_pusher.clone(),
        ));

        // 3. UseCases
        let connect_participant_usecase = Arc::new(ConnectParticipantUseCase::new(
            repository.clone(),
            message_pusher.clone(),
            session_store.clone(),
            sessions.clone(),
            router.clone(),
            TokenValidator::new(identity_provider),
            clock.clone(),
        ));
        let disconnect_participant_usecase = Arc::new(DisconnectParticipantUseCase::new(
            repository.clone(),
            message_pusher,
            session_store.clone(),
            sessions.clone(),
            router.clone(),
            clock.clone(),
        ));
        let action_dispatcher = Arc::new(ActionDispatcher::new(
            SendChatUseCase::new(sessions.clone(), router.clone(), clock.clone()),
            RespondUserInfoUseCase::new(sessions.clone(), router.clone()),
            TimerUseCase::new(
                repository.clone(),
                session_store.clone(),
                sessions.clone(),
                router.clone(),
                clock.clone(),
            ),
            PlannerUseCase::new(repository, session_store, sessions, router.clone(), clock),
            router.clone(),
        ));

        Self::new(
            connect_participant_usecase,
            disconnect_participant_usecase,
            action_dispatcher,
            router,
        )
    }

    /// Build the axum router
    pub fn into_router(self) -> Router {
        let app_state = Arc::new(AppState {
            connect_participant_usecase: self.connect_participant_usecase,
            disconnect_participant_usecase: self.disconnect_participant_usecase,
            action_dispatcher: self.action_dispatcher,
            router: self.router,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/rooms", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Run the study room server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Study room server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/rooms", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
