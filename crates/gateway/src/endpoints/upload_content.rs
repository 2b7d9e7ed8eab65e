//! # POST /upload_content
//!
//! アップロードパイプライン。
//! 墨消し → 派生のローカル保存 → 原本のオブジェクトストア保存 →
//! レジストリ登録、の4段階を順に実行する。

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use veil_types::ContentRecord;

use crate::config::GatewayState;
use crate::error::GatewayError;
use crate::retry::with_retry;

/// POST /upload_content — アップロードパイプライン。
///
/// multipart/form-data のフィールド `file` を受け取る。ファイル名が
/// サニタイズを経てコンテンツ識別子になる。レジストリへの登録が
/// コミットポイントであり、途中の段階で失敗した場合レコードは
/// 取得側から一切見えない。
pub async fn handle_upload_content(
    State(state): State<Arc<GatewayState>>,
    mut multipart: Multipart,
) -> Result<Json<ContentRecord>, GatewayError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        GatewayError::BadRequest(format!("multipartの読み取りに失敗: {e}"))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .ok_or_else(|| {
                GatewayError::BadRequest("fileフィールドにファイル名がありません".to_string())
            })?
            .to_string();
        let data = field.bytes().await.map_err(|e| {
            GatewayError::BadRequest(format!("fileフィールドの読み取りに失敗: {e}"))
        })?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| {
        GatewayError::BadRequest("fileフィールドがありません".to_string())
    })?;

    if data.is_empty() {
        return Err(GatewayError::BadRequest("ファイルが空です".to_string()));
    }
    if data.len() as u64 > state.max_upload_size {
        return Err(GatewayError::BadRequest(format!(
            "ファイルサイズが上限を超えています: {} bytes（上限: {} bytes）",
            data.len(),
            state.max_upload_size
        )));
    }

    let content_id = sanitize_content_id(&filename)?;

    // 同一識別子のアップロードを直列化する
    let _guard = state.registry.lock_upload(&content_id).await;

    // 1) 墨消し
    let redacted = with_retry(&state.retry, || {
        state.redaction.transform(data.clone(), &content_id)
    })
    .await
    .map_err(|source| GatewayError::Upstream {
        stage: "redaction",
        source,
    })?;

    // 2) 派生をローカルに保存
    let redacted_ref = state.redacted_store.save(&content_id, &redacted).await?;

    // 3) 原本をオブジェクトストアへ
    let object_ref =
        match with_retry(&state.retry, || state.object_store.put(data.clone())).await {
            Ok(object_ref) => object_ref,
            Err(source) => {
                // 後段が失敗したので2)で書いた派生を消す。
                // 後始末の失敗はログに留め、元のエラーを返す。
                if let Err(cleanup_err) = state.redacted_store.remove(&redacted_ref).await {
                    tracing::warn!(
                        %content_id,
                        error = %cleanup_err,
                        "墨消し派生の後始末に失敗しました"
                    );
                }
                return Err(GatewayError::Upstream {
                    stage: "object_store",
                    source,
                });
            }
        };

    // 4) コミット: レジストリに登録（同一識別子は上書き）
    let record = ContentRecord {
        content_id: content_id.clone(),
        redacted_ref,
        object_ref,
    };
    state.registry.commit(record.clone()).await;

    tracing::info!(%content_id, object_ref = %record.object_ref, "コンテンツを登録しました");
    Ok(Json(record))
}

/// クライアント指定のファイル名からコンテンツ識別子を導出する。
///
/// ファイル名はそのままストレージパスの構成要素になるため、
/// ディレクトリ部分を取り除き、パス走査や制御文字を含む名前は拒否する。
fn sanitize_content_id(filename: &str) -> Result<String, GatewayError> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or("");

    if name.is_empty() || name == "." || name == ".." {
        return Err(GatewayError::BadRequest(format!(
            "ファイル名が不正です: {filename}"
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(GatewayError::BadRequest(
            "ファイル名に制御文字が含まれています".to_string(),
        ));
    }

    Ok(name.to_string())
}
