//! ドメイン層
//!
//! 値オブジェクト・エンティティ・エラー、および外部の関心事への窓口となる
//! trait（Room Registry / MessagePusher / SessionStore / IdentityProvider）を定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

pub mod entity;
pub mod error;
pub mod identity;
pub mod message_pusher;
pub mod repository;
pub mod session;
pub mod session_store;
pub mod value_object;

pub use entity::{
    ChatMessage, ConnectionStateRecord, Identity, Member, PlannerChange, PlannerDraft,
    PlannerEntry, Room, RoomProfile, RoomSeed, RoomSnapshot, RunState, TimerAction, TimerCommand,
    TimerState,
};
pub use error::{
    AuthError, DataAccessError, MessagePushError, PhaseError, RepositoryError, RoomError,
    ValueObjectError,
};
pub use identity::IdentityProvider;
pub use message_pusher::{MessagePusher, PusherChannel};
pub use repository::{RoomGuard, RoomRepository};
pub use session::{ConnectionContext, ConnectionPhase, ConnectionSession, JoinedSession};
pub use session_store::SessionStore;
#[cfg(test)]
pub use session_store::MockSessionStore;
pub use value_object::{ConnectionId, ImageUrl, MessageContent, Nickname, RoomId, Timestamp};
