//! # 上流呼び出しのリトライ
//!
//! 一時的な失敗（トランスポート失敗・5xx）に対する指数バックオフつき
//! リトライ。何回・どの間隔で試みるかはデプロイごとに設定で決める。
//! アダプタ層はリトライしないため、このヘルパーは
//! オーケストレータ層からのみ使う。

use std::future::Future;
use std::time::Duration;

use crate::clients::UpstreamError;

/// 上流呼び出しのリトライポリシー。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 1呼び出しあたりの最大試行回数。`1` はリトライなし。
    pub max_attempts: u32,
    /// 初回リトライまでの待ち時間。以降は失敗のたびに倍になる。
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `attempt`回目（1始まり）の失敗後に待つ時間。
    fn next_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// `op` を最大 `policy.max_attempts` 回試行する。
///
/// リトライに値しない失敗（4xx応答）は待たずにそのまま返す。
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T, UpstreamError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.next_delay(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "上流呼び出しをリトライします"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    /// 一時的な失敗のあと成功すればOkが返ることを確認
    #[tokio::test]
    async fn test_retries_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result = with_retry(&fast_policy(3), || {
            let calls = calls2.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(UpstreamError::Status {
                        status: 503,
                        body: "unavailable".to_string(),
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// 4xxはリトライせず即座に返ることを確認
    #[tokio::test]
    async fn test_does_not_retry_client_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<(), _> = with_retry(&fast_policy(3), || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(UpstreamError::Status {
                    status: 400,
                    body: "bad input".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// 最大試行回数で打ち切られることを確認
    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<(), _> = with_retry(&fast_policy(2), || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(UpstreamError::Transport("connection reset".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// バックオフが指数的に伸びることを確認
    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
        };
        assert_eq!(policy.next_delay(1), Duration::from_millis(200));
        assert_eq!(policy.next_delay(2), Duration::from_millis(400));
        assert_eq!(policy.next_delay(3), Duration::from_millis(800));
    }
}
