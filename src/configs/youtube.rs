use serde::{Deserialize, Serialize};

/// Which extraction backend resolves and opens streams.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Innertube,
    YtDlp,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YouTubeConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Netscape-format cookies.txt exported while signed in. Empty or absent
    /// means no credentials are configured.
    #[serde(default)]
    pub cookies_file: Option<String>,
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            cookies_file: None,
            ytdlp_path: default_ytdlp_path(),
        }
    }
}

impl YouTubeConfig {
    /// The configured cookies path, treating the empty string as unset.
    pub fn cookies_path(&self) -> Option<&str> {
        self.cookies_file.as_deref().filter(|p| !p.is_empty())
    }
}
