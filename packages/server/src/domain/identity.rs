//! 外部 ID プロバイダの trait 定義

use async_trait::async_trait;

use super::{AuthError, Identity};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Bearer ` を取り除いたトークンを検証し、ペイロードを返す
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}
