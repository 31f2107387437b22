//! 外部データアクセス層の実装
//!
//! - `inmemory`: プロセス内に保持する実装（単体起動・テスト用）

pub mod inmemory;

pub use inmemory::{InMemorySessionStore, TimerRecord};
