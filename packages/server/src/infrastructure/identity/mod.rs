//! 外部 ID プロバイダの実装
//!
//! - `jwt`: 共有鍵（HS256）で署名された JWT を検証する実装

pub mod jwt;

pub use jwt::JwtIdentityProvider;
