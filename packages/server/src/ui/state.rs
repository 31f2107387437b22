//! Shared application state.

use std::sync::Arc;

use crate::usecase::{
    ActionDispatcher, BroadcastRouter, ConnectParticipantUseCase, DisconnectParticipantUseCase,
};

/// Shared application state
pub struct AppState {
    /// ConnectParticipantUseCase（認証・参加のユースケース）
    pub connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    /// DisconnectParticipantUseCase（退出のユースケース）
    pub disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    /// ActionDispatcher（参加後のアクションの振り分け）
    pub action_dispatcher: Arc<ActionDispatcher>,
    /// BroadcastRouter（失敗の報告に使う）
    pub router: Arc<BroadcastRouter>,
}
