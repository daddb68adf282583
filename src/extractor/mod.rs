use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::common::errors::RelayError;
use crate::common::types::{AnyError, AnyResult, AudioContainer, VideoId};
use crate::configs::{BackendKind, YouTubeConfig};

pub mod credentials;
pub mod innertube;
pub mod ytdlp;

#[cfg(test)]
pub mod testing;

pub use credentials::{CookieFileProvider, CredentialProvider, Credentials};
pub use innertube::InnertubeBackend;
pub use ytdlp::YtDlpBackend;

/// One upstream encoding of a video, as reported by a backend's manifest.
///
/// The `handle` is opaque to everything but the backend that produced it: a
/// resolved googlevideo URL for the in-process backend, a format id for the
/// yt-dlp backend. It is chosen once per relay session and never re-resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFormat {
    pub itag: Option<i64>,
    pub mime_type: String,
    pub codec: Option<String>,
    pub container: AudioContainer,
    pub bitrate: Option<i64>,
    pub content_length: Option<u64>,
    #[serde(skip)]
    pub handle: String,
}

impl StreamFormat {
    pub fn is_audio_only(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }

    /// Base MIME for the `Content-Type` header, codec parameters stripped,
    /// falling back to the container default.
    pub fn content_type(&self) -> String {
        let base = self.mime_type.split(';').next().unwrap_or("").trim();
        if base.is_empty() {
            self.container.default_mime().to_string()
        } else {
            base.to_string()
        }
    }
}

/// An open upstream byte stream plus what the upstream told us about it.
pub struct UpstreamStream {
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub bytes: BoxStream<'static, Result<Bytes, AnyError>>,
}

/// The extraction capability: enumerate and open YouTube media streams.
///
/// Two adapters exist behind this seam, selected by `[youtube].backend`.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Accepted-URL grammar check, applied after normalization.
    fn can_handle(&self, url: &str) -> bool;

    /// Whether `open_stream` can serve byte ranges. Backends that cannot make
    /// the relay degrade to full-body 200 responses.
    fn supports_range(&self) -> bool {
        false
    }

    /// Fetch the full format manifest for a video. Audio-only filtering is
    /// the resolver's job, not the backend's.
    async fn fetch_manifest(&self, video_id: &VideoId) -> Result<Vec<StreamFormat>, RelayError>;

    /// Open the byte stream for a previously chosen format, optionally
    /// forwarding a client byte range.
    async fn open_stream(
        &self,
        video_id: &VideoId,
        format: &StreamFormat,
        range: Option<&str>,
    ) -> Result<UpstreamStream, RelayError>;
}

/// Construct the configured backend with its credential provider.
pub fn backend_from_config(config: &YouTubeConfig) -> AnyResult<Arc<dyn ExtractionBackend>> {
    let credentials: Arc<dyn CredentialProvider> = Arc::new(CookieFileProvider::new(
        config.cookies_path().map(std::path::PathBuf::from),
    ));

    match config.backend {
        BackendKind::Innertube => Ok(Arc::new(InnertubeBackend::new(credentials)?)),
        BackendKind::YtDlp => Ok(Arc::new(YtDlpBackend::new(
            config.ytdlp_path.clone(),
            credentials,
        ))),
    }
}
