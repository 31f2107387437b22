//! JWT を使った IdentityProvider 実装
//!
//! 署名と有効期限（`exp`）を検証し、ペイロードを `Identity` として返す。

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{AuthError, Identity, IdentityProvider};

/// JWT のペイロード
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// 共有鍵で署名された JWT を検証する
pub struct JwtIdentityProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("JWT verification failed: {}", e);
            AuthError::InvalidCredential(e.to_string())
        })?;

        Ok(Identity {
            subject: data.claims.sub,
            claims: data.claims.rest,
        })
    }
}
