use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::relay::{resolver, stream, url};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    pub url: Option<String>,
}

/// `GET /api/audio?url=<raw>`: resolve and proxy one audio stream.
pub async fn stream_audio(
    Query(params): Query<AudioQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(raw) = params.url.filter(|u| !u.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing url").into_response();
    };

    tracing::info!(
        "GET /api/audio url={} range={:?}",
        raw,
        headers.get(header::RANGE)
    );

    let canonical = match url::normalize(&raw) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!("GET /api/audio: {}", e);
            return e.into_response();
        }
    };

    let resolved = resolver::resolve(
        state.backend.as_ref(),
        &state.config.relay,
        &state.manifest_cache,
        &canonical,
    )
    .await;

    let (video_id, format) = match resolved {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("GET /api/audio: resolution failed for {}: {}", canonical, e);
            return e.into_response();
        }
    };

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    match stream::open(
        state.backend.as_ref(),
        state.config.relay.range_policy,
        &video_id,
        &format,
        range,
    )
    .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("GET /api/audio: stream open failed for {}: {}", video_id, e);
            e.into_response()
        }
    }
}

/// `GET /api/formats?url=<raw>`: audio-only manifest plus the descriptor the
/// selection policy would pick.
pub async fn list_formats(
    Query(params): Query<AudioQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(raw) = params.url.filter(|u| !u.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing url").into_response();
    };

    let canonical = match url::normalize(&raw) {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };

    let manifest = resolver::audio_manifest(
        state.backend.as_ref(),
        &state.config.relay,
        &state.manifest_cache,
        &canonical,
    )
    .await;

    match manifest {
        Ok((video_id, formats)) => {
            let selected = resolver::select_audio_format(&formats);
            Json(serde_json::json!({
                "videoId": video_id,
                "formats": formats,
                "selected": selected,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::warn!("GET /api/formats: {}", e);
            e.into_response()
        }
    }
}

/// CORS preflight for browser media elements issuing ranged requests.
pub async fn preflight() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,HEAD,OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Range"),
    );
    (StatusCode::NO_CONTENT, headers).into_response()
}
