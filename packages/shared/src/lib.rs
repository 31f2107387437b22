//! Utilities shared by the study room workspace crates.

pub mod logger;
pub mod time;
