use std::path::PathBuf;

/// Cookies loaded from disk, ready for outbound request construction.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Path of the cookies file, for backends that pass it through verbatim.
    pub cookies_path: PathBuf,
    /// `Cookie` header value assembled from the youtube.com entries.
    pub cookie_header: String,
}

/// Injected credential source. `None` means not configured, which is a valid
/// state: unauthenticated extraction works until the upstream starts issuing
/// bot-detection challenges.
pub trait CredentialProvider: Send + Sync {
    fn load(&self) -> Option<Credentials>;
}

/// Reads a Netscape-format cookies.txt (the format browser exporters and
/// yt-dlp agree on) from a fixed path.
pub struct CookieFileProvider {
    path: Option<PathBuf>,
}

impl CookieFileProvider {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl CredentialProvider for CookieFileProvider {
    fn load(&self) -> Option<Credentials> {
        let path = self.path.as_ref()?;
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Could not read cookies file {}: {}", path.display(), e);
                return None;
            }
        };

        let cookie_header = cookie_header_from_netscape(&text)?;
        Some(Credentials {
            cookies_path: path.clone(),
            cookie_header,
        })
    }
}

/// Assemble a `Cookie` header from the youtube.com / google.com lines of a
/// Netscape cookies file. Fields per line, tab-separated:
/// domain, subdomain flag, path, secure flag, expiry, name, value.
fn cookie_header_from_netscape(text: &str) -> Option<String> {
    let mut pairs = Vec::new();

    for line in text.lines() {
        // Session cookies exported by some browsers hide behind #HttpOnly_.
        let line = line.trim().trim_start_matches("#HttpOnly_");
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            continue;
        }

        let domain = fields[0].trim_start_matches('.');
        if !(domain.ends_with("youtube.com") || domain.ends_with("google.com")) {
            continue;
        }

        pairs.push(format!("{}={}", fields[5], fields[6]));
    }

    (!pairs.is_empty()).then(|| pairs.join("; "))
}
