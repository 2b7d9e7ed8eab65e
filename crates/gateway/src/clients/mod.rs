//! # 外部コラボレータHTTPクライアント
//!
//! 墨消しサービス・オブジェクトストア・アクセスオラクルへの薄いアダプタ。
//! 各アダプタはステートレスで、上流のステータスコードとボディを
//! そのままエラーに載せて返す。リトライはここでは行わない
//! （リトライはオーケストレータ層の責務）。

pub mod object_store;
pub mod oracle;
pub mod redaction;

pub use object_store::ObjectStoreClient;
pub use oracle::OracleClient;
pub use redaction::RedactionClient;

/// コラボレータ呼び出しの失敗。
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// 送信・タイムアウト等、HTTP交換自体が完了しなかった
    #[error("HTTP通信失敗: {0}")]
    Transport(String),
    /// 上流が非成功ステータスを返した
    #[error("HTTP {status} - {body}")]
    Status {
        /// 上流のステータスコード
        status: u16,
        /// 上流の診断ボディ
        body: String,
    },
}

impl UpstreamError {
    /// 上流のステータスコード。トランスポート失敗時は `None`。
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Transport(_) => None,
            UpstreamError::Status { status, .. } => Some(*status),
        }
    }

    /// リトライに値する失敗かどうか。
    /// トランスポート失敗と5xxは一時的な失敗として扱い、4xxはリトライしない。
    pub fn is_retryable(&self) -> bool {
        match self.status() {
            None => true,
            Some(status) => status >= 500,
        }
    }
}

/// 非成功応答を `UpstreamError::Status` に変換する。
/// 診断のため上流ボディを読み取って保持する。
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}
