//! # コンテンツレジストリ
//!
//! `content_id` → `ContentRecord` のインメモリ写像。プロセス内で唯一の
//! 共有可変状態であり、裏のマップは公開せず原子的な操作のみを提供する。
//! 永続化はしない（プロセス生存期間 = レジストリ生存期間）。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use veil_types::ContentRecord;

/// アップロード済みコンテンツのレジストリ。
///
/// 書き込みはアップロードオーケストレータのみ、読み取りは
/// 取得オーケストレータのみが行う。
pub struct ContentRegistry {
    /// content_id → レコード
    records: RwLock<HashMap<String, ContentRecord>>,
    /// content_idごとのアップロード直列化ロック。
    /// エントリ数は登録済み識別子数と同程度にとどまる。
    upload_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ContentRegistry {
    /// 空のレジストリを作成する。
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            upload_locks: Mutex::new(HashMap::new()),
        }
    }

    /// 登録済みレコードを取得する。
    pub async fn get(&self, content_id: &str) -> Option<ContentRecord> {
        self.records.read().await.get(content_id).cloned()
    }

    /// レコードを登録する。同一識別子の既存レコードは上書きされる。
    ///
    /// この挿入がアップロードパイプラインのコミットポイントであり、
    /// 挿入前のレコードが取得側から見えることはない。
    pub async fn commit(&self, record: ContentRecord) {
        self.records
            .write()
            .await
            .insert(record.content_id.clone(), record);
    }

    /// 同一`content_id`のアップロードを直列化するロックを取得する。
    ///
    /// 返されたガードを保持している間、同じ識別子に対する他の
    /// アップロードは待機する。異なる識別子同士は互いにブロックしない。
    pub async fn lock_upload(&self, content_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.upload_locks.lock().await;
            locks.entry(content_id.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content_id: &str, suffix: &str) -> ContentRecord {
        ContentRecord {
            content_id: content_id.to_string(),
            redacted_ref: format!("redacted-{suffix}"),
            object_ref: format!("object-{suffix}"),
        }
    }

    /// 同一識別子への再登録が上書きになることを確認
    #[tokio::test]
    async fn test_commit_overwrites() {
        let registry = ContentRegistry::new();
        registry.commit(record("a.jpg", "1")).await;
        registry.commit(record("a.jpg", "2")).await;

        let got = registry.get("a.jpg").await.unwrap();
        assert_eq!(got.redacted_ref, "redacted-2");
        assert_eq!(got.object_ref, "object-2");
    }

    /// 未登録の識別子はNoneを返すことを確認
    #[tokio::test]
    async fn test_get_missing() {
        let registry = ContentRegistry::new();
        assert!(registry.get("missing").await.is_none());
    }

    /// 並行登録後、全レコードが完全な形で読めることを確認
    #[tokio::test]
    async fn test_concurrent_commits_are_independent() {
        let registry = Arc::new(ContentRegistry::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("content-{i}.jpg");
                registry.commit(record(&id, &i.to_string())).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..16 {
            let id = format!("content-{i}.jpg");
            let got = registry.get(&id).await.unwrap();
            assert_eq!(got.content_id, id);
            assert_eq!(got.redacted_ref, format!("redacted-{i}"));
            assert_eq!(got.object_ref, format!("object-{i}"));
        }
    }

    /// 同一識別子のアップロードロックが直列化されることを確認
    #[tokio::test]
    async fn test_lock_upload_serializes_same_id() {
        let registry = Arc::new(ContentRegistry::new());
        let events = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..2 {
            let registry = registry.clone();
            let events = events.clone();
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock_upload("same.jpg").await;
                events.lock().await.push(format!("start-{i}"));
                tokio::time::sleep(std::time::Duration::from_millis(30)).await;
                events.lock().await.push(format!("end-{i}"));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 区間が交差しないこと: start-x の直後は必ず end-x
        let events = events.lock().await;
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].replace("start", "end"), events[1]);
        assert_eq!(events[2].replace("start", "end"), events[3]);
    }
}
