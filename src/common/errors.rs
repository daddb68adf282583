use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Everything that can go wrong between accepting a relay request and
/// committing the first response byte.
///
/// Failures after streaming has begun never surface here; the connection is
/// torn down instead, since status and headers are already on the wire.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Well-formed request, but not a recognizable video URL.
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    /// The backend reports the video as removed, private or restricted.
    #[error("Video unavailable: {0}")]
    VideoUnavailable(String),

    /// The manifest holds no audio-only rendition.
    #[error("No audio stream available")]
    NoAudioStream,

    /// The upstream rejected the request as automated traffic. Requires
    /// operator intervention, not a retry.
    #[error("{0}")]
    UpstreamBlocked(String),

    /// Network or backend failure before the first byte was sent.
    #[error("Upstream error: {0}")]
    UpstreamUnavailable(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamBlocked(_) => StatusCode::FORBIDDEN,
            Self::VideoUnavailable(_) | Self::NoAudioStream | Self::UpstreamUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether a fresh attempt could plausibly succeed. Only transport-level
    /// failures qualify; everything else is a property of the video itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }

    pub fn blocked_by_bot_check() -> Self {
        Self::UpstreamBlocked(
            "YouTube is blocking automated requests for this video. Export a fresh cookies.txt \
             while signed in and point [youtube].cookies_file at it, or try another video."
                .to_string(),
        )
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            RelayError::InvalidUrl("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::blocked_by_bot_check().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(RelayError::NoAudioStream.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            RelayError::VideoUnavailable("gone".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::UpstreamUnavailable("reset".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn only_transport_failures_retry() {
        assert!(RelayError::UpstreamUnavailable("timeout".into()).is_retryable());
        assert!(!RelayError::VideoUnavailable("private".into()).is_retryable());
        assert!(!RelayError::blocked_by_bot_check().is_retryable());
        assert!(!RelayError::NoAudioStream.is_retryable());
    }
}
