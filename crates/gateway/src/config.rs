//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! すべての変数は省略可能で、既定値はローカル開発向け。

use std::time::Duration;

use crate::clients::{ObjectStoreClient, OracleClient, RedactionClient};
use crate::registry::ContentRegistry;
use crate::retry::RetryPolicy;
use crate::storage::RedactedStore;

/// オラクル失敗時の扱い。
///
/// 既定の `Error` はアクセス判定が取れなかったことを内部エラーとして
/// 呼び出し元に返す。`Deny` は判定不能を「閲覧不可」に倒す
/// フェイルクローズ運用で、デプロイごとに選択する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleFailurePolicy {
    /// 内部エラーとして呼び出し元に返す
    Error,
    /// 閲覧不可として扱う（墨消し派生を返す）
    Deny,
}

impl OracleFailurePolicy {
    /// 環境変数値をパースする。
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "error" => Ok(Self::Error),
            "deny" => Ok(Self::Deny),
            other => anyhow::bail!(
                "ORACLE_FAILURE_POLICYの値が不正です: {other}（error | deny のいずれか）"
            ),
        }
    }
}

/// 起動時に環境変数から読み込まれる設定。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// リッスンアドレス
    pub addr: String,
    /// 墨消しサービスのエンドポイントURL
    pub redaction_url: String,
    /// オブジェクトストアのベースURL
    pub object_store_url: String,
    /// アクセスオラクルのエンドポイントURL
    pub oracle_url: String,
    /// 墨消し派生の保存先ディレクトリ
    pub redacted_dir: String,
    /// アップロード最大サイズ（バイト）
    pub max_upload_size: u64,
    /// 上流呼び出し1回あたりのタイムアウト
    pub upstream_timeout: Duration,
    /// 上流呼び出しのリトライポリシー
    pub retry: RetryPolicy,
    /// オラクル失敗時の扱い
    pub oracle_failure_policy: OracleFailurePolicy,
}

impl GatewayConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = env_or("GATEWAY_ADDR", "0.0.0.0:8082");
        let redaction_url = env_or("REDACTION_SERVICE_URL", "http://localhost:5000/redact");
        let object_store_url = env_or("OBJECT_STORE_URL", "http://localhost:8081");
        let oracle_url = env_or("ACCESS_ORACLE_URL", "http://localhost:5001/has_access");
        let redacted_dir = env_or("REDACTED_STORAGE_DIR", "./redacted_storage");

        // 100 MiB
        let max_upload_size = env_parse("MAX_UPLOAD_SIZE", 104_857_600u64)?;
        let upstream_timeout = Duration::from_secs(env_parse("UPSTREAM_TIMEOUT_SECS", 30u64)?);
        let retry = RetryPolicy {
            max_attempts: env_parse("UPSTREAM_RETRY_MAX", 1u32)?,
            base_delay: Duration::from_millis(env_parse("UPSTREAM_RETRY_BASE_MS", 200u64)?),
        };
        let oracle_failure_policy =
            OracleFailurePolicy::parse(&env_or("ORACLE_FAILURE_POLICY", "error"))?;

        Ok(Self {
            addr,
            redaction_url,
            object_store_url,
            oracle_url,
            redacted_dir,
            max_upload_size,
            upstream_timeout,
            retry,
            oracle_failure_policy,
        })
    }
}

/// 環境変数を読み、未設定なら既定値を返す。
fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// 環境変数を読み、パースする。未設定なら既定値を返す。
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| anyhow::anyhow!("{name}のパースに失敗: {e}")),
        Err(_) => Ok(default),
    }
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// 墨消しサービスクライアント
    pub redaction: RedactionClient,
    /// オブジェクトストアクライアント
    pub object_store: ObjectStoreClient,
    /// アクセスオラクルクライアント
    pub oracle: OracleClient,
    /// コンテンツレジストリ
    pub registry: ContentRegistry,
    /// 墨消し派生ストレージ（トレイトで抽象化）
    pub redacted_store: Box<dyn RedactedStore>,
    /// アップロード最大サイズ（バイト）
    pub max_upload_size: u64,
    /// 上流呼び出しのリトライポリシー
    pub retry: RetryPolicy,
    /// オラクル失敗時の扱い
    pub oracle_failure_policy: OracleFailurePolicy,
}
