//! # オブジェクトストアクライアント
//!
//! コンテンツアドレス型ブロブストアのput/get操作。
//! 原本バイト列を預け、不透明なオブジェクト識別子で取り出す。

use veil_types::ObjectPutResponse;

use super::{check_status, UpstreamError};

/// オブジェクトストアへのHTTPアダプタ。
pub struct ObjectStoreClient {
    http: reqwest::Client,
    base_url: String,
}

impl ObjectStoreClient {
    /// ベースURL（例: `http://localhost:8081`）から構築する。
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// バイト列を保存し、オブジェクト識別子を返す。
    ///
    /// `POST <base>/upload` にボディをそのまま送信し、
    /// 応答JSON `{object_id}` を読み取る。
    pub async fn put(&self, data: Vec<u8>) -> Result<String, UpstreamError> {
        let url = format!("{}/upload", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let response = check_status(response).await?;
        let parsed: ObjectPutResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Transport(format!("応答のパースに失敗: {e}")))?;
        Ok(parsed.object_id)
    }

    /// オブジェクト識別子からバイト列を取り出す。
    ///
    /// `GET <base>/download?object_id=<ref>` の成功応答ボディを返す。
    pub async fn get(&self, object_ref: &str) -> Result<Vec<u8>, UpstreamError> {
        let url = format!("{}/download", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[("object_id", object_ref)])
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
