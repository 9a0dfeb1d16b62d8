//! The update API endpoint.
//!
//! One route, dispatched on the `action` query argument the way the
//! WordPress update protocol expects: `get_metadata` answers with the
//! package metadata JSON, `download` streams the package archive. The
//! download link inside the metadata is only present (and signed) for
//! requests carrying a valid license key.

use crate::error::{ApiError, ApiResult};
use crate::license::{add_query_arg, License};
use crate::request::{is_valid_slug, RequestContext, UpdateQuery};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

/// Entry point for `GET /updates`.
pub async fn handle(
    State(state): State<AppState>,
    Query(query): Query<UpdateQuery>,
    headers: axum::http::HeaderMap,
) -> ApiResult<Response> {
    let ctx = RequestContext::from_headers(&headers);
    debug!(
        action = %query.action,
        slug = query.slug.as_deref().unwrap_or(""),
        client_ip = ?ctx.client_ip,
        ssl = ctx.ssl,
        "update request"
    );

    match query.action.as_str() {
        "get_metadata" => get_metadata(&state, &query, &ctx).await,
        "download" => download(&state, &query).await,
        other => Err(ApiError::BadRequest(format!("Invalid action: {other}"))),
    }
}

async fn get_metadata(
    state: &AppState,
    query: &UpdateQuery,
    ctx: &RequestContext,
) -> ApiResult<Response> {
    let slug = require_slug(query)?;

    let mut meta = state
        .packages
        .metadata(slug)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("Package {slug}")))?;

    // Echo the license back so the plugin does not need a separate
    // request to learn its own license state.
    if let Some(auth_key) = &ctx.auth_key {
        meta["auth_key"] = json!(auth_key);
    }

    if state.license.is_valid(ctx.auth_key.as_deref()) {
        let uid = License::download_uid(
            slug,
            query.wp_version.as_deref().unwrap_or(""),
            query.site_url.as_deref().unwrap_or(""),
        );
        if let Some(url) = meta.get("download_url").and_then(Value::as_str) {
            let signed = add_query_arg(url, "uid", &uid);
            meta["download_url"] = json!(signed);
        }
    } else if let Some(object) = meta.as_object_mut() {
        // No license, no download link.
        object.remove("download_url");
    }

    Ok(Json(meta).into_response())
}

async fn download(state: &AppState, query: &UpdateQuery) -> ApiResult<Response> {
    let slug = require_slug(query)?;

    let uid = query.uid.as_deref().unwrap_or("");
    let valid = License::is_uid_valid(
        "download",
        slug,
        query.wp_version.as_deref().unwrap_or(""),
        query.site_url.as_deref().unwrap_or(""),
        uid,
    );
    if !valid {
        return Err(if uid.is_empty() {
            ApiError::LicenseRequired
        } else {
            ApiError::LicenseInvalid
        });
    }

    let path = state.packages.archive_path(slug);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("Package {slug}")));
        }
        Err(err) => return Err(ApiError::Internal(err.into())),
    };

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{slug}.zip\""),
        ),
    ];
    Ok((headers, bytes).into_response())
}

fn require_slug(query: &UpdateQuery) -> ApiResult<&str> {
    match query.slug.as_deref() {
        Some(slug) if is_valid_slug(slug) => Ok(slug),
        Some(slug) => Err(ApiError::BadRequest(format!("Invalid slug: {slug}"))),
        None => Err(ApiError::BadRequest("Missing slug".to_string())),
    }
}
