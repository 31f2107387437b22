//! UseCase 層
//!
//! 接続のライフサイクル（認証・参加・退出）と、参加後の各アクションを実装します。
//! 失敗はすべて `Result` で返し、クライアントへの `error` イベントへの変換は
//! `BroadcastRouter::report_failure` の一箇所で行います。

mod broadcast_router;
mod connect_participant;
mod disconnect_participant;
mod dispatch;
mod error;
mod planner;
mod respond_user_info;
mod send_chat;
mod session_table;
mod timer;
mod token_validator;

#[cfg(test)]
mod test_support;

pub use broadcast_router::{BroadcastRouter, Target};
pub use connect_participant::{ConnectParticipantUseCase, ConnectionQuery};
pub use disconnect_participant::{DisconnectOutcome, DisconnectParticipantUseCase};
pub use dispatch::ActionDispatcher;
pub use error::{ActionError, ConnectError, DisconnectError};
pub use planner::PlannerUseCase;
pub use respond_user_info::RespondUserInfoUseCase;
pub use send_chat::SendChatUseCase;
pub use session_table::SessionTable;
pub use timer::TimerUseCase;
pub use token_validator::TokenValidator;
