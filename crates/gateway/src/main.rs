//! # Veil Content Gateway
//!
//! アップロードされたコンテンツへのアクセスを仲介するゲートウェイ。
//! 呼び出し元のアクセス権に応じて、墨消し派生（ブラー画像等）と
//! 原本バイト列のどちらかを開示する。
//!
//! ## 役割
//! - アップロードパイプライン
//!   （墨消し → 派生のローカル保存 → 原本のオブジェクトストア保存 → レジストリ登録）
//! - アクセス判定つき取得パイプライン
//! - 外部コラボレータ（墨消しサービス・オブジェクトストア・アクセスオラクル）への中継
//!
//! ## API エンドポイント
//! - `POST /upload_content` — コンテンツのアップロード
//! - `GET /get_content?user=&content_id=` — アクセス判定つきコンテンツ取得

mod clients;
mod config;
mod endpoints;
mod error;
mod registry;
mod retry;
mod storage;

use std::sync::Arc;

use clients::{ObjectStoreClient, OracleClient, RedactionClient};
use config::{GatewayConfig, GatewayState};
use endpoints::{handle_get_content, handle_upload_content};
use registry::ContentRegistry;
use storage::FsRedactedStore;

/// GatewayのRouterを構築する。
pub(crate) fn router(state: Arc<GatewayState>) -> axum::Router {
    // ボディ上限 = 設定されたアップロード上限 + multipartフレーミング分
    let body_limit = state.max_upload_size as usize + 64 * 1024;

    axum::Router::new()
        .route(
            "/upload_content",
            axum::routing::post(handle_upload_content),
        )
        .route("/get_content", axum::routing::get(handle_get_content))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        redaction_url = %config.redaction_url,
        object_store_url = %config.object_store_url,
        oracle_url = %config.oracle_url,
        redacted_dir = %config.redacted_dir,
        "コラボレータ設定を読み込みました"
    );

    // 上流呼び出しはすべてこのクライアント経由（タイムアウトを一括設定）
    let http = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()?;

    let state = Arc::new(GatewayState {
        redaction: RedactionClient::new(http.clone(), config.redaction_url),
        object_store: ObjectStoreClient::new(http.clone(), config.object_store_url),
        oracle: OracleClient::new(http, config.oracle_url),
        registry: ContentRegistry::new(),
        redacted_store: Box::new(FsRedactedStore::new(config.redacted_dir)),
        max_upload_size: config.max_upload_size,
        retry: config.retry,
        oracle_failure_policy: config.oracle_failure_policy,
    });

    let app = router(state);

    tracing::info!("Gatewayを {} で起動します", config.addr);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
