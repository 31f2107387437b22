//! Data Transfer Objects (DTOs) for the study room protocol.
//!
//! - `websocket`: WebSocket event frames (`{"event": ..., "data": ...}`)
//! - `conversion`: conversions between DTOs and domain types

pub mod conversion;
pub mod websocket;
