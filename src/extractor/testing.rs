//! Test doubles for the extraction seam.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Mutex;

use crate::common::errors::RelayError;
use crate::common::types::{AnyError, AudioContainer, VideoId};
use crate::extractor::{ExtractionBackend, StreamFormat, UpstreamStream};

pub fn mp4_format(content_length: u64) -> StreamFormat {
    StreamFormat {
        itag: Some(140),
        mime_type: "audio/mp4; codecs=\"mp4a.40.2\"".to_string(),
        codec: Some("mp4a.40.2".to_string()),
        container: AudioContainer::Mp4,
        bitrate: Some(128_000),
        content_length: Some(content_length),
        handle: "mock-140".to_string(),
    }
}

pub fn webm_format(itag: i64) -> StreamFormat {
    StreamFormat {
        itag: Some(itag),
        mime_type: "audio/webm; codecs=\"opus\"".to_string(),
        codec: Some("opus".to_string()),
        container: AudioContainer::Webm,
        bitrate: Some(160_000),
        content_length: None,
        handle: format!("mock-{}", itag),
    }
}

pub fn video_format() -> StreamFormat {
    StreamFormat {
        itag: Some(137),
        mime_type: "video/mp4; codecs=\"avc1.640028\"".to_string(),
        codec: Some("avc1.640028".to_string()),
        container: AudioContainer::Other,
        bitrate: Some(4_500_000),
        content_length: Some(99_999_999),
        handle: "mock-137".to_string(),
    }
}

/// Scripted backend: a fixed manifest, a fixed body, optional pre-success
/// manifest errors, and observability hooks for retries and cancellation.
pub struct MockBackend {
    pub formats: Vec<StreamFormat>,
    pub body: Bytes,
    pub manifest_errors: Mutex<VecDeque<RelayError>>,
    pub manifest_calls: AtomicUsize,
    pub range_support: bool,
    pub fail_mid_stream: bool,
    /// Set when the upstream stream is dropped, completed or not.
    pub released: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new(formats: Vec<StreamFormat>) -> Self {
        Self {
            formats,
            body: Bytes::from_static(b"0123456789abcdef"),
            manifest_errors: Mutex::new(VecDeque::new()),
            manifest_calls: AtomicUsize::new(0),
            range_support: true,
            fail_mid_stream: false,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_manifest_errors(self, errors: Vec<RelayError>) -> Self {
        *self.manifest_errors.lock().unwrap() = errors.into();
        self
    }

    pub fn without_range_support(mut self) -> Self {
        self.range_support = false;
        self
    }

    pub fn failing_mid_stream(mut self) -> Self {
        self.fail_mid_stream = true;
        self
    }
}

struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn parse_range(range: &str, len: usize) -> (usize, usize) {
    let spec = range.trim_start_matches("bytes=");
    let (start, end) = spec.split_once('-').unwrap_or((spec, ""));
    let start: usize = start.parse().unwrap_or(0);
    let end: usize = end
        .parse::<usize>()
        .map(|e| (e + 1).min(len))
        .unwrap_or(len);
    (start.min(len), end)
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("youtube.com") || url.contains("youtu.be")
    }

    fn supports_range(&self) -> bool {
        self.range_support
    }

    async fn fetch_manifest(&self, _video_id: &VideoId) -> Result<Vec<StreamFormat>, RelayError> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.manifest_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.formats.clone())
    }

    async fn open_stream(
        &self,
        _video_id: &VideoId,
        _format: &StreamFormat,
        range: Option<&str>,
    ) -> Result<UpstreamStream, RelayError> {
        let total = self.body.len();
        let (start, end) = match range {
            Some(r) => parse_range(r, total),
            None => (0, total),
        };
        let slice = self.body.slice(start..end);

        let content_range = range
            .map(|_| format!("bytes {}-{}/{}", start, end.saturating_sub(1), total));

        // Two chunks so mid-stream failure and cancellation both happen after
        // partial delivery.
        let mid = slice.len() / 2;
        let mut chunks: VecDeque<Result<Bytes, AnyError>> = VecDeque::new();
        chunks.push_back(Ok(slice.slice(..mid)));
        if self.fail_mid_stream {
            chunks.push_back(Err("simulated upstream reset".into()));
        } else {
            chunks.push_back(Ok(slice.slice(mid..)));
        }

        let guard = ReleaseGuard(self.released.clone());
        let bytes = futures::stream::unfold((chunks, guard), |(mut chunks, guard)| async move {
            chunks.pop_front().map(|item| (item, (chunks, guard)))
        })
        .boxed();

        Ok(UpstreamStream {
            content_length: Some((end - start) as u64),
            content_range,
            bytes,
        })
    }
}
