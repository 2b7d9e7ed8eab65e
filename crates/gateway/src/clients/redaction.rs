//! # 墨消しサービスクライアント
//!
//! 原本バイト列を墨消しサービスに送り、プライバシー保護済みの
//! 派生バイト列（ブラー画像等）を受け取る。

use super::{check_status, UpstreamError};

/// 墨消しサービスへのHTTPアダプタ。
pub struct RedactionClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RedactionClient {
    /// エンドポイントURL（例: `http://localhost:5000/redact`）から構築する。
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// 原本バイト列を変換する。
    ///
    /// multipart/form-data のフィールド `file` として送信し、
    /// 成功応答のボディをそのまま派生バイト列として返す。
    pub async fn transform(
        &self,
        data: Vec<u8>,
        filename: &str,
    ) -> Result<Vec<u8>, UpstreamError> {
        let part = reqwest::multipart::Part::bytes(data).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let response = check_status(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(format!("応答の読み取りに失敗: {e}")))?;
        Ok(bytes.to_vec())
    }
}
