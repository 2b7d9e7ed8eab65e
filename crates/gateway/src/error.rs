//! # Gatewayエラー型
//!
//! パイプラインの失敗を、失敗した段階の名前つきで呼び出し元に伝える。

use axum::http::StatusCode;

use crate::clients::UpstreamError;

/// Gatewayエラー型。
///
/// `stage` はアップロード・取得パイプラインのどの段階で失敗したかを示す
/// （`redaction` / `redacted_persist` / `object_store` / `redacted_read` /
/// `object_store_read`）。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// コンテンツ識別子がレジストリに存在しない
    #[error("コンテンツが見つかりません: {0}")]
    NotFound(String),
    /// コラボレータが失敗応答を返した
    #[error("上流サービスエラー（{stage}）: {source}")]
    Upstream {
        /// 失敗した段階の名前
        stage: &'static str,
        /// 上流のステータスコードとボディ
        #[source]
        source: UpstreamError,
    },
    /// 墨消し派生のローカル読み書きに失敗
    #[error("ローカルストレージエラー（{stage}）: {message}")]
    Storage {
        /// 失敗した段階の名前
        stage: &'static str,
        /// 失敗内容
        message: String,
    },
    /// アクセス判定を取得できなかった
    #[error("アクセス判定を取得できませんでした: {0}")]
    Oracle(UpstreamError),
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream { .. }
            | GatewayError::Storage { .. }
            | GatewayError::Oracle(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
