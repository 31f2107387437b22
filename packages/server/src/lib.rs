//! Real-time study room server.
//!
//! Authenticated WebSocket clients join named rooms and share presence,
//! chat, a run/stop study timer and a daily planner. Room state lives in
//! memory; persistence and identity are behind the `SessionStore` and
//! `IdentityProvider` ports.

pub mod config;

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
