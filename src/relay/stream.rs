use std::sync::LazyLock;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use regex::Regex;
use uuid::Uuid;

use crate::common::errors::RelayError;
use crate::common::types::VideoId;
use crate::configs::RangePolicy;
use crate::extractor::{ExtractionBackend, StreamFormat};

static RANGE_SPEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bytes=(\d+)-(\d+)?").expect("static regex"));

/// Open one relay session: upstream connection in, response with a streaming
/// body out.
///
/// The format was chosen by the resolver before this call and is opened via
/// its opaque handle; nothing is re-resolved here. Once the response is
/// returned, failures can no longer change status or headers: an upstream
/// error mid-body tears the connection down, and a client disconnect drops
/// the body stream, releasing the upstream side.
pub async fn open(
    backend: &dyn ExtractionBackend,
    policy: RangePolicy,
    video_id: &VideoId,
    format: &StreamFormat,
    range: Option<&str>,
) -> Result<Response, RelayError> {
    let session = Uuid::new_v4();

    // Ranges are forwarded only when both the policy and the backend allow;
    // otherwise the full body goes out as a plain 200.
    let effective_range = match policy {
        RangePolicy::Forward if backend.supports_range() => range,
        _ => None,
    };

    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&format.content_type()) {
        headers.insert(header::CONTENT_TYPE, v);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Ok(v) = HeaderValue::from_str(&format!(
        "inline; filename=\"audio.{}\"",
        format.container.file_extension()
    )) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }

    let upstream = backend.open_stream(video_id, format, effective_range).await?;

    let status = if effective_range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let content_length = if effective_range.is_some() {
        upstream.content_length
    } else {
        format.content_length.or(upstream.content_length)
    };
    if let Some(len) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    if status == StatusCode::PARTIAL_CONTENT {
        let content_range = upstream.content_range.clone().or_else(|| {
            effective_range
                .zip(format.content_length)
                .and_then(|(r, total)| synthesize_content_range(r, total))
        });
        if let Some(cr) = content_range {
            if let Ok(v) = HeaderValue::from_str(&cr) {
                headers.insert(header::CONTENT_RANGE, v);
            }
        }
    }

    tracing::debug!(
        "Relay session {} opened: video={} itag={:?} range={:?} backend={}",
        session,
        video_id,
        format.itag,
        effective_range,
        backend.name()
    );

    let bytes = upstream.bytes.inspect_err(move |e| {
        tracing::warn!(
            "Relay session {} upstream error after response start: {}",
            session,
            e
        );
    });

    Ok((status, headers, Body::from_stream(bytes)).into_response())
}

/// `Content-Range` for upstreams that satisfy a range without echoing one
/// back, computable only when the total size is known.
fn synthesize_content_range(range: &str, total: u64) -> Option<String> {
    let caps = RANGE_SPEC.captures(range)?;
    let start: u64 = caps.get(1)?.as_str().parse().ok()?;
    let end: u64 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_else(|| total.saturating_sub(1));
    Some(format!("bytes {}-{}/{}", start, end, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::VideoId;
    use crate::extractor::testing::{MockBackend, mp4_format};
    use http_body_util::BodyExt;
    use std::sync::atomic::Ordering;

    fn video_id() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn full_body_response_is_200_with_media_headers() {
        let backend = MockBackend::new(vec![mp4_format(16)]);
        let format = mp4_format(16);

        let response = open(&backend, RangePolicy::Forward, &video_id(), &format, None)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let header_str = |name: header::HeaderName| {
            response
                .headers()
                .get(&name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        assert_eq!(header_str(header::CONTENT_TYPE).as_deref(), Some("audio/mp4"));
        assert_eq!(header_str(header::CACHE_CONTROL).as_deref(), Some("no-store"));
        assert_eq!(
            header_str(header::ACCESS_CONTROL_ALLOW_ORIGIN).as_deref(),
            Some("*")
        );
        assert_eq!(header_str(header::ACCEPT_RANGES).as_deref(), Some("bytes"));
        assert_eq!(header_str(header::CONTENT_LENGTH).as_deref(), Some("16"));
        assert_eq!(
            header_str(header::CONTENT_DISPOSITION).as_deref(),
            Some("inline; filename=\"audio.m4a\"")
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"0123456789abcdef");
    }

    #[tokio::test]
    async fn forwarded_range_yields_206_from_the_requested_offset() {
        let backend = MockBackend::new(vec![mp4_format(16)]);
        let format = mp4_format(16);

        let response = open(
            &backend,
            RangePolicy::Forward,
            &video_id(),
            &format,
            Some("bytes=4-"),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok()),
            Some("bytes 4-15/16")
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"456789abcdef");
    }

    #[tokio::test]
    async fn ignore_policy_serves_the_full_body_with_200() {
        let backend = MockBackend::new(vec![mp4_format(16)]);
        let format = mp4_format(16);

        let response = open(
            &backend,
            RangePolicy::Ignore,
            &video_id(),
            &format,
            Some("bytes=4-"),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_RANGE).is_none());

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"0123456789abcdef");
    }

    #[tokio::test]
    async fn rangeless_backend_degrades_to_200() {
        let backend = MockBackend::new(vec![mp4_format(16)]).without_range_support();
        let format = mp4_format(16);

        let response = open(
            &backend,
            RangePolicy::Forward,
            &video_id(),
            &format,
            Some("bytes=4-"),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"0123456789abcdef");
    }

    #[tokio::test]
    async fn upstream_error_after_start_truncates_the_body() {
        let backend = MockBackend::new(vec![mp4_format(16)]).failing_mid_stream();
        let format = mp4_format(16);

        let response = open(&backend, RangePolicy::Forward, &video_id(), &format, None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body();
        let first = body.frame().await.expect("first frame").expect("data");
        assert_eq!(&first.into_data().unwrap()[..], b"01234567");

        let second = body.frame().await.expect("second frame");
        assert!(second.is_err(), "stream should surface the upstream error");
    }

    #[tokio::test]
    async fn dropping_the_body_releases_the_upstream() {
        let backend = MockBackend::new(vec![mp4_format(16)]);
        let format = mp4_format(16);
        let released = backend.released.clone();

        let response = open(&backend, RangePolicy::Forward, &video_id(), &format, None)
            .await
            .unwrap();

        let mut body = response.into_body();
        let _ = body.frame().await.expect("first frame").expect("data");
        assert!(!released.load(Ordering::SeqCst));

        drop(body);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn content_range_synthesis() {
        assert_eq!(
            synthesize_content_range("bytes=100-", 4096).as_deref(),
            Some("bytes 100-4095/4096")
        );
        assert_eq!(
            synthesize_content_range("bytes=0-99", 4096).as_deref(),
            Some("bytes 0-99/4096")
        );
        assert_eq!(synthesize_content_range("lines=1-2", 4096), None);
    }
}
