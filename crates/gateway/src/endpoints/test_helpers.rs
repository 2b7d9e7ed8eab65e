//! # エンドポイントテスト用共通ヘルパー
//!
//! upload_content / get_content のテストで共有するモックコラボレータ群と、
//! モック一式につないだGatewayの起動。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Multipart, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tokio::sync::Mutex;

use crate::clients::{ObjectStoreClient, OracleClient, RedactionClient};
use crate::config::{GatewayState, OracleFailurePolicy};
use crate::registry::ContentRegistry;
use crate::retry::RetryPolicy;
use crate::storage::FsRedactedStore;

/// モック墨消しサービスの変換。
/// テストは派生バイト列の同一性をこの関数で検証する。
pub(crate) fn mock_redact(data: &[u8]) -> Vec<u8> {
    [b"redacted:".as_slice(), data].concat()
}

/// Routerを127.0.0.1の空きポートで起動し、ポート番号を返す。
pub(crate) async fn serve(app: axum::Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

/// モック墨消しサービスを起動する。
async fn start_mock_redaction() -> u16 {
    let app = axum::Router::new().route(
        "/redact",
        axum::routing::post(|mut multipart: Multipart| async move {
            while let Some(field) = multipart.next_field().await.unwrap() {
                if field.name() == Some("file") {
                    let data = field.bytes().await.unwrap();
                    return mock_redact(&data).into_response();
                }
            }
            (StatusCode::BAD_REQUEST, "no file field").into_response()
        }),
    );
    serve(app).await
}

/// 常に500を返す墨消しサービスを起動する。
async fn start_failing_redaction() -> u16 {
    let app = axum::Router::new().route(
        "/redact",
        axum::routing::post(|| async {
            (StatusCode::INTERNAL_SERVER_ERROR, "redaction exploded")
        }),
    );
    serve(app).await
}

/// インメモリのモックオブジェクトストアを起動する。
/// 最初の`fail_puts`回のputには503を返す。
async fn start_mock_object_store(fail_puts: u32) -> u16 {
    type Stored = Arc<Mutex<HashMap<String, Vec<u8>>>>;
    let stored: Stored = Arc::new(Mutex::new(HashMap::new()));
    let put_count = Arc::new(AtomicU32::new(0));

    let put_stored = stored.clone();
    let get_stored = stored.clone();

    let app = axum::Router::new()
        .route(
            "/upload",
            axum::routing::post(move |body: Bytes| {
                let stored = put_stored.clone();
                let put_count = put_count.clone();
                async move {
                    let n = put_count.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= fail_puts {
                        return (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
                            .into_response();
                    }
                    let object_id = format!("obj-{n}");
                    stored.lock().await.insert(object_id.clone(), body.to_vec());
                    axum::Json(serde_json::json!({ "object_id": object_id })).into_response()
                }
            }),
        )
        .route(
            "/download",
            axum::routing::get(move |Query(params): Query<HashMap<String, String>>| {
                let stored = get_stored.clone();
                async move {
                    let guard = stored.lock().await;
                    match params.get("object_id").and_then(|id| guard.get(id)) {
                        Some(data) => data.clone().into_response(),
                        None => (StatusCode::NOT_FOUND, "no such object").into_response(),
                    }
                }
            }),
        );
    serve(app).await
}

/// putが常に503で失敗するオブジェクトストアを起動する。
async fn start_failing_object_store() -> u16 {
    let app = axum::Router::new().route(
        "/upload",
        axum::routing::post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "store down") }),
    );
    serve(app).await
}

/// `allowed_user` にのみ閲覧可を返すモックオラクルを起動する。
async fn start_mock_oracle(allowed_user: &'static str) -> u16 {
    let app = axum::Router::new().route(
        "/has_access",
        axum::routing::get(move |Query(params): Query<HashMap<String, String>>| async move {
            let has = params.get("user").map(String::as_str) == Some(allowed_user);
            axum::Json(serde_json::json!({ "has": has }))
        }),
    );
    serve(app).await
}

/// 常に500を返すオラクルを起動する。
async fn start_failing_oracle() -> u16 {
    let app = axum::Router::new().route(
        "/has_access",
        axum::routing::get(|| async {
            (StatusCode::INTERNAL_SERVER_ERROR, "oracle down")
        }),
    );
    serve(app).await
}

/// モックコラボレータの構成。
enum RedactionMock {
    Ok,
    Failing,
}

enum ObjectStoreMock {
    Ok,
    Failing,
    Flaky(u32),
}

enum OracleMock {
    AllowOnly(&'static str),
    Failing,
}

/// テスト用Gateway一式のビルダー。
pub(crate) struct TestEnvBuilder {
    redaction: RedactionMock,
    object_store: ObjectStoreMock,
    oracle: OracleMock,
    oracle_failure_policy: OracleFailurePolicy,
}

impl TestEnvBuilder {
    pub(crate) fn failing_redaction(mut self) -> Self {
        self.redaction = RedactionMock::Failing;
        self
    }

    pub(crate) fn failing_object_store(mut self) -> Self {
        self.object_store = ObjectStoreMock::Failing;
        self
    }

    pub(crate) fn flaky_object_store(mut self, fail_puts: u32) -> Self {
        self.object_store = ObjectStoreMock::Flaky(fail_puts);
        self
    }

    pub(crate) fn failing_oracle(mut self) -> Self {
        self.oracle = OracleMock::Failing;
        self
    }

    pub(crate) fn deny_on_oracle_failure(mut self) -> Self {
        self.oracle_failure_policy = OracleFailurePolicy::Deny;
        self
    }

    /// モック群とGatewayを起動する。
    pub(crate) async fn start(self) -> TestEnv {
        let redaction_port = match self.redaction {
            RedactionMock::Ok => start_mock_redaction().await,
            RedactionMock::Failing => start_failing_redaction().await,
        };
        let store_port = match self.object_store {
            ObjectStoreMock::Ok => start_mock_object_store(0).await,
            ObjectStoreMock::Flaky(n) => start_mock_object_store(n).await,
            ObjectStoreMock::Failing => start_failing_object_store().await,
        };
        let oracle_port = match self.oracle {
            OracleMock::AllowOnly(user) => start_mock_oracle(user).await,
            OracleMock::Failing => start_failing_oracle().await,
        };

        let redacted_dir = tempfile::tempdir().unwrap();
        let http = reqwest::Client::new();
        let state = Arc::new(GatewayState {
            redaction: RedactionClient::new(
                http.clone(),
                format!("http://127.0.0.1:{redaction_port}/redact"),
            ),
            object_store: ObjectStoreClient::new(
                http.clone(),
                format!("http://127.0.0.1:{store_port}"),
            ),
            oracle: OracleClient::new(
                http,
                format!("http://127.0.0.1:{oracle_port}/has_access"),
            ),
            registry: ContentRegistry::new(),
            redacted_store: Box::new(FsRedactedStore::new(redacted_dir.path())),
            max_upload_size: 1024 * 1024,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            },
            oracle_failure_policy: self.oracle_failure_policy,
        });

        let gateway_port = serve(crate::router(state.clone())).await;

        TestEnv {
            state,
            gateway_port,
            redacted_dir,
        }
    }
}

/// モック一式につないだテスト用Gateway。
///
/// 既定の構成: 墨消し・オブジェクトストアは正常、
/// オラクルは `u1` のみ閲覧可、オラクル失敗時はエラー返却。
pub(crate) struct TestEnv {
    pub state: Arc<GatewayState>,
    pub gateway_port: u16,
    pub redacted_dir: tempfile::TempDir,
}

impl TestEnv {
    pub(crate) fn builder() -> TestEnvBuilder {
        TestEnvBuilder {
            redaction: RedactionMock::Ok,
            object_store: ObjectStoreMock::Ok,
            oracle: OracleMock::AllowOnly("u1"),
            oracle_failure_policy: OracleFailurePolicy::Error,
        }
    }

    pub(crate) async fn start() -> Self {
        Self::builder().start().await
    }

    /// `/upload_content` にmultipartでファイルを送る。
    pub(crate) async fn upload(&self, filename: &str, data: &[u8]) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        reqwest::Client::new()
            .post(format!(
                "http://127.0.0.1:{}/upload_content",
                self.gateway_port
            ))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    /// `/get_content` を呼ぶ。
    pub(crate) async fn get_content(
        &self,
        params: &[(&str, &str)],
    ) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!(
                "http://127.0.0.1:{}/get_content",
                self.gateway_port
            ))
            .query(params)
            .send()
            .await
            .unwrap()
    }
}
