//! # GET /get_content
//!
//! 取得パイプライン。
//! レジストリ照会 → アクセス判定 → 墨消し派生または原本の返却。

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::config::{GatewayState, OracleFailurePolicy};
use crate::error::GatewayError;
use crate::retry::with_retry;

/// /get_content クエリパラメータ。
#[derive(Debug, Deserialize)]
pub struct GetContentQuery {
    /// プリンシパル識別子
    pub user: Option<String>,
    /// コンテンツ識別子
    pub content_id: Option<String>,
}

/// GET /get_content — アクセス判定つきコンテンツ取得。
///
/// オラクルが閲覧不可と答えたらローカルの墨消し派生（`image/png`）を、
/// 閲覧可と答えたらオブジェクトストアの原本
/// （`application/octet-stream`）を返す。判定が決定的である限り、
/// 同一`(user, content_id)`の開示クラスは常に同じになる。
pub async fn handle_get_content(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<GetContentQuery>,
) -> Result<Response, GatewayError> {
    let user = query.user.filter(|v| !v.is_empty()).ok_or_else(|| {
        GatewayError::BadRequest("userパラメータがありません".to_string())
    })?;
    let content_id = query.content_id.filter(|v| !v.is_empty()).ok_or_else(|| {
        GatewayError::BadRequest("content_idパラメータがありません".to_string())
    })?;

    let record = state
        .registry
        .get(&content_id)
        .await
        .ok_or_else(|| GatewayError::NotFound(content_id.clone()))?;

    let has_access = match with_retry(&state.retry, || {
        state.oracle.decide(&user, &content_id)
    })
    .await
    {
        Ok(has) => has,
        Err(source) => match state.oracle_failure_policy {
            OracleFailurePolicy::Error => return Err(GatewayError::Oracle(source)),
            OracleFailurePolicy::Deny => {
                tracing::warn!(
                    %user,
                    %content_id,
                    error = %source,
                    "アクセス判定が取得できないため閲覧不可として扱います"
                );
                false
            }
        },
    };

    if !has_access {
        // 閲覧不可: 墨消し派生を返す
        let data = state.redacted_store.load(&record.redacted_ref).await?;
        return Ok(([(header::CONTENT_TYPE, "image/png")], data).into_response());
    }

    // 閲覧可: 原本をオブジェクトストアから取得する
    let data = with_retry(&state.retry, || {
        state.object_store.get(&record.object_ref)
    })
    .await
    .map_err(|source| GatewayError::Upstream {
        stage: "object_store_read",
        source,
    })?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    )
        .into_response())
}
