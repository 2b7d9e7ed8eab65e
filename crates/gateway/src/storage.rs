//! # 墨消し派生ストレージ
//!
//! 墨消し派生（ブラー画像等）のローカル保存の抽象インターフェースと
//! ファイルシステム実装。
//!
//! Gateway運用者はローカルディスク以外のバックエンドを
//! 実装として選択できる。

use std::path::PathBuf;

use crate::error::GatewayError;

/// 墨消し派生ストレージの抽象インターフェース。
#[async_trait::async_trait]
pub trait RedactedStore: Send + Sync {
    /// 派生バイト列を保存し、保存先ハンドル（`redacted_ref`）を返す。
    ///
    /// 同一`content_id`への再保存は上書きとなる。
    async fn save(&self, content_id: &str, data: &[u8]) -> Result<String, GatewayError>;

    /// ハンドルから派生バイト列を読み出す。
    async fn load(&self, redacted_ref: &str) -> Result<Vec<u8>, GatewayError>;

    /// ハンドルの指す派生を削除する。
    /// アップロードパイプラインの後段が失敗したときの後始末に使う。
    async fn remove(&self, redacted_ref: &str) -> Result<(), GatewayError>;
}

/// ローカルファイルシステムによる墨消し派生ストレージ実装。
///
/// `<dir>/<content_id>.redacted.png` に保存し、そのパスをハンドルとして返す。
/// `content_id` はサニタイズ済みであることが前提（パス区切りを含まない）。
pub struct FsRedactedStore {
    /// 派生の保存先ディレクトリ
    dir: PathBuf,
}

impl FsRedactedStore {
    /// 保存先ディレクトリから構築する。ディレクトリは保存時に作成される。
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl RedactedStore for FsRedactedStore {
    async fn save(&self, content_id: &str, data: &[u8]) -> Result<String, GatewayError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| GatewayError::Storage {
                stage: "redacted_persist",
                message: format!("ディレクトリ作成失敗: {e}"),
            })?;

        let path = self.dir.join(format!("{content_id}.redacted.png"));
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| GatewayError::Storage {
                stage: "redacted_persist",
                message: format!("書き込み失敗: {e}"),
            })?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn load(&self, redacted_ref: &str) -> Result<Vec<u8>, GatewayError> {
        tokio::fs::read(redacted_ref)
            .await
            .map_err(|e| GatewayError::Storage {
                stage: "redacted_read",
                message: format!("読み取り失敗（{redacted_ref}）: {e}"),
            })
    }

    async fn remove(&self, redacted_ref: &str) -> Result<(), GatewayError> {
        tokio::fs::remove_file(redacted_ref)
            .await
            .map_err(|e| GatewayError::Storage {
                stage: "redacted_persist",
                message: format!("削除失敗（{redacted_ref}）: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 保存→読み出しのラウンドトリップを確認
    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRedactedStore::new(dir.path());

        let redacted_ref = store.save("a.jpg", b"blurred-bytes").await.unwrap();
        assert!(redacted_ref.ends_with("a.jpg.redacted.png"));

        let loaded = store.load(&redacted_ref).await.unwrap();
        assert_eq!(loaded, b"blurred-bytes");
    }

    /// 同一識別子への再保存が上書きになることを確認
    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRedactedStore::new(dir.path());

        let ref1 = store.save("a.jpg", b"first").await.unwrap();
        let ref2 = store.save("a.jpg", b"second").await.unwrap();
        assert_eq!(ref1, ref2);
        assert_eq!(store.load(&ref2).await.unwrap(), b"second");
    }

    /// 存在しないハンドルの読み出しがredacted_read段階の失敗になることを確認
    #[tokio::test]
    async fn test_load_missing_is_read_stage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRedactedStore::new(dir.path());

        let missing = dir.path().join("none.redacted.png");
        let err = store
            .load(&missing.to_string_lossy())
            .await
            .unwrap_err();
        match err {
            GatewayError::Storage { stage, .. } => assert_eq!(stage, "redacted_read"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// 削除後は読み出せないことを確認
    #[tokio::test]
    async fn test_remove_deletes_derivative() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRedactedStore::new(dir.path());

        let redacted_ref = store.save("a.jpg", b"blurred").await.unwrap();
        store.remove(&redacted_ref).await.unwrap();
        assert!(store.load(&redacted_ref).await.is_err());
    }
}
