//! # アクセスオラクルクライアント
//!
//! プリンシパルがコンテンツの原本を閲覧できるかの判定を問い合わせる。
//! 判定ロジック自体（オンチェーン等）はオラクル側の関心事で、
//! Gatewayは真偽値の答えだけを受け取る。

use veil_types::AccessDecision;

use super::{check_status, UpstreamError};

/// アクセスオラクルへのHTTPアダプタ。
pub struct OracleClient {
    http: reqwest::Client,
    endpoint: String,
}

impl OracleClient {
    /// エンドポイントURL（例: `http://localhost:5001/has_access`）から構築する。
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// `(principal, content_id)` に対する閲覧可否を問い合わせる。
    ///
    /// `GET <endpoint>?user=<principal>&content_id=<id>` の
    /// 応答JSON `{has}` を読み取る。
    pub async fn decide(&self, user: &str, content_id: &str) -> Result<bool, UpstreamError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("user", user), ("content_id", content_id)])
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let response = check_status(response).await?;
        let decision: AccessDecision = response
            .json()
            .await
            .map_err(|e| UpstreamError::Transport(format!("応答のパースに失敗: {e}")))?;
        Ok(decision.has)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use std::collections::HashMap;

    /// クエリパラメータが正しく渡り、判定が往復することを確認
    #[tokio::test]
    async fn test_decide_roundtrip() {
        let app = axum::Router::new().route(
            "/has_access",
            axum::routing::get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("user").map(String::as_str), Some("u1"));
                assert_eq!(params.get("content_id").map(String::as_str), Some("a.jpg"));
                axum::Json(serde_json::json!({ "has": true }))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = OracleClient::new(
            reqwest::Client::new(),
            format!("http://127.0.0.1:{port}/has_access"),
        );
        assert!(client.decide("u1", "a.jpg").await.unwrap());
    }
}
