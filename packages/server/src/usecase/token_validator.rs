//! UseCase: トークン検証
//!
//! `"Bearer <token>"` 形式の資格情報を検証し、身元情報を返す。
//! 状態は一切変更しない。

use std::sync::Arc;

use crate::domain::{AuthError, Identity, IdentityProvider};

const BEARER_PREFIX: &str = "Bearer ";

/// `"Bearer <token>"` からトークン部分を取り出す
fn strip_bearer(raw: Option<&str>) -> Result<&str, AuthError> {
    let token = raw
        .and_then(|raw| raw.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .ok_or(AuthError::MissingOrMalformedCredential)?;
    if token.is_empty() {
        return Err(AuthError::MissingOrMalformedCredential);
    }
    Ok(token)
}

/// トークン検証のユースケース
pub struct TokenValidator {
    identity_provider: Arc<dyn IdentityProvider>,
}

impl TokenValidator {
    pub fn new(identity_provider: Arc<dyn IdentityProvider>) -> Self {
        Self { identity_provider }
    }

    /// 資格情報を検証
    ///
    /// # Returns
    ///
    /// * `Ok(Identity)` - 検証成功
    /// * `Err(AuthError::MissingOrMalformedCredential)` - 資格情報が無い、または `Bearer ` で始まらない
    /// * `Err(AuthError::InvalidCredential)` - 署名・有効期限・ペイロードの検証に失敗
    pub async fn validate(&self, raw: Option<&str>) -> Result<Identity, AuthError> {
        let token = strip_bearer(raw)?;
        self.identity_provider.verify(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Map;

    /// "good" だけを受け付けるプロバイダ
    struct StaticProvider;

    #[async_trait]
    impl IdentityProvider for StaticProvider {
        async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
            if token == "good" {
                Ok(Identity {
                    subject: "user-1".to_string(),
                    claims: Map::new(),
                })
            } else {
                Err(AuthError::InvalidCredential("bad signature".to_string()))
            }
        }
    }

    fn validator() -> TokenValidator {
        TokenValidator::new(Arc::new(StaticProvider))
    }

    #[tokio::test]
    async fn test_validate_bearer_token() {
        // テスト項目: Bearer 形式の正しいトークンは受け付けられる
        // when (操作):
        let identity = validator().validate(Some("Bearer good")).await.unwrap();

        // then (期待する結果):
        assert_eq!(identity.subject, "user-1");
    }

    #[tokio::test]
    async fn test_validate_malformed_credentials() {
        // テスト項目: 資格情報が無い・形式が違う場合は MissingOrMalformedCredential
        // given (前提条件):
        let cases = [None, Some(""), Some("good"), Some("bearer good"), Some("Bearer "), Some("Basic good")];

        // then (期待する結果):
        for raw in cases {
            assert_eq!(
                validator().validate(raw).await,
                Err(AuthError::MissingOrMalformedCredential),
                "{raw:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_validate_invalid_token() {
        // テスト項目: 検証に失敗したトークンは InvalidCredential
        // when (操作):
        let result = validator().validate(Some("Bearer forged")).await;

        // then (期待する結果):
        assert!(matches!(result, Err(AuthError::InvalidCredential(_))));
    }
}
