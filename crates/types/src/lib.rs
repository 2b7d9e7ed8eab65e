//! # Veil Gateway 共有型定義
//!
//! Gatewayと外部コラボレータの間で交換されるデータ構造をRust構造体として提供する。
//!
//! ## 登場する参照の種類
//! - `content_id`: アップロード時のファイル名から導出されるコンテンツ識別子
//! - `redacted_ref`: 墨消し派生（ブラー画像等）の保存先を指すハンドル
//! - `object_ref`: オブジェクトストアが発行する不透明なオブジェクト識別子

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// コンテンツレコード
// ---------------------------------------------------------------------------

/// アップロード済みコンテンツ1件を表すレコード。
///
/// レジストリに登録された時点でアップロードパイプラインはコミット済みとなる。
/// `/upload_content` の成功レスポンスボディでもある。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// コンテンツ識別子（サニタイズ済みファイル名）
    pub content_id: String,
    /// 墨消し派生の保存先ハンドル
    pub redacted_ref: String,
    /// オブジェクトストア上の原本を指す識別子
    pub object_ref: String,
}

// ---------------------------------------------------------------------------
// オブジェクトストア応答
// ---------------------------------------------------------------------------

/// オブジェクトストアのput応答。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectPutResponse {
    /// 保存されたオブジェクトの識別子
    pub object_id: String,
}

// ---------------------------------------------------------------------------
// アクセスオラクル応答
// ---------------------------------------------------------------------------

/// アクセスオラクルの判定応答。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    /// 当該プリンシパルが原本を閲覧できる場合 `true`
    pub has: bool,
}
