//! HTTP API endpoint handlers.

use axum::Json;

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        // テスト項目: ヘルスチェックは status: ok を返す
        // when (操作):
        let Json(body) = health_check().await;

        // then (期待する結果):
        assert_eq!(body, serde_json::json!({"status": "ok"}));
    }
}
