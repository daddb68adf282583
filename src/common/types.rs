use serde::{Deserialize, Serialize};

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

/// The 11-character YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Accepts exactly 11 characters of the YouTube id alphabet.
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == 11
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(s.to_string()))
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::ops::Deref for VideoId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audio container of an upstream stream format.
///
/// YouTube serves audio-only renditions in either an MP4 (AAC) or a WebM
/// (Opus) container; anything else is treated as opaque bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioContainer {
    Mp4,
    Webm,
    Other,
}

impl AudioContainer {
    pub fn from_mime(mime: &str) -> Self {
        let base = mime.split(';').next().unwrap_or(mime).trim();
        match base {
            "audio/mp4" | "audio/m4a" | "audio/aac" => Self::Mp4,
            "audio/webm" | "audio/opus" => Self::Webm,
            _ => Self::Other,
        }
    }

    /// Default `Content-Type` when the descriptor carries no usable MIME.
    pub fn default_mime(self) -> &'static str {
        match self {
            Self::Mp4 => "audio/mp4",
            Self::Webm => "audio/webm",
            Self::Other => "application/octet-stream",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Mp4 => "m4a",
            Self::Webm => "webm",
            Self::Other => "bin",
        }
    }
}
