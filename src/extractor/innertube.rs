use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header;
use serde_json::{Value, json};

use crate::common::errors::RelayError;
use crate::common::http;
use crate::common::types::{AnyError, AnyResult, AudioContainer, VideoId};
use crate::extractor::{CredentialProvider, ExtractionBackend, StreamFormat, UpstreamStream};

/// InnerTube API base endpoint (googleapis is more stable and avoids some
/// geo-restrictions that www.youtube.com may impose).
const INNERTUBE_API: &str = "https://youtubei.googleapis.com";

/// The Android client context returns plain, cipher-free stream URLs, which
/// is what makes in-process extraction viable without a JS interpreter.
const CLIENT_NAME: &str = "ANDROID";
const CLIENT_ID: &str = "3";
const CLIENT_VERSION: &str = "20.01.35";
const USER_AGENT: &str = "com.google.android.youtube/20.01.35 (Linux; U; Android 14) identity";

/// In-process extraction against the InnerTube `player` API.
pub struct InnertubeBackend {
    player_http: reqwest::Client,
    stream_http: reqwest::Client,
    url_regex: Regex,
    credentials: Arc<dyn CredentialProvider>,
}

impl InnertubeBackend {
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> AnyResult<Self> {
        Ok(Self {
            player_http: http::manifest_client(USER_AGENT, Duration::from_secs(10))?,
            stream_http: http::stream_client(&http::default_user_agent())?,
            url_regex: Regex::new(r"(?:youtube\.com|youtu\.be)")?,
            credentials,
        })
    }

    fn build_context() -> Value {
        json!({
            "client": {
                "clientName": CLIENT_NAME,
                "clientVersion": CLIENT_VERSION,
                "userAgent": USER_AGENT,
                "osName": "Android",
                "osVersion": "14",
                "androidSdkVersion": "34",
                "hl": "en",
                "gl": "US"
            },
            "user": { "lockedSafetyMode": false },
            "request": { "useSsl": true }
        })
    }

    async fn player_request(&self, video_id: &VideoId) -> Result<Value, RelayError> {
        let body = json!({
            "context": Self::build_context(),
            "videoId": video_id.to_string(),
            "contentCheckOk": true,
            "racyCheckOk": true
        });

        let url = format!("{}/youtubei/v1/player?prettyPrint=false", INNERTUBE_API);

        let mut req = self
            .player_http
            .post(&url)
            .header("X-YouTube-Client-Name", CLIENT_ID)
            .header("X-YouTube-Client-Version", CLIENT_VERSION);

        if let Some(creds) = self.credentials.load() {
            req = req.header(header::COOKIE, creds.cookie_header);
        }

        let res = req.json(&body).send().await.map_err(|e| {
            RelayError::UpstreamUnavailable(format!("player request failed: {}", e))
        })?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            RelayError::UpstreamUnavailable(format!("player response read failed: {}", e))
        })?;

        if !status.is_success() {
            tracing::warn!("InnerTube player returned {}: {}", status, text);
            if status == StatusCode::FORBIDDEN {
                return Err(RelayError::blocked_by_bot_check());
            }
            return Err(RelayError::UpstreamUnavailable(format!(
                "player request returned {}",
                status
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            RelayError::UpstreamUnavailable(format!("player response was not JSON: {}", e))
        })
    }
}

#[async_trait]
impl ExtractionBackend for InnertubeBackend {
    fn name(&self) -> &'static str {
        "innertube"
    }

    fn can_handle(&self, url: &str) -> bool {
        self.url_regex.is_match(url)
    }

    fn supports_range(&self) -> bool {
        true
    }

    async fn fetch_manifest(&self, video_id: &VideoId) -> Result<Vec<StreamFormat>, RelayError> {
        let body = self.player_request(video_id).await?;
        parse_player_response(&body)
    }

    async fn open_stream(
        &self,
        video_id: &VideoId,
        format: &StreamFormat,
        range: Option<&str>,
    ) -> Result<UpstreamStream, RelayError> {
        let mut req = self
            .stream_http
            .get(&format.handle)
            .header(header::ORIGIN, "https://www.youtube.com")
            .header(header::REFERER, video_id.watch_url());

        if let Some(range) = range {
            req = req.header(header::RANGE, range);
        }
        if let Some(creds) = self.credentials.load() {
            req = req.header(header::COOKIE, creds.cookie_header);
        }

        let res = req.send().await.map_err(|e| {
            RelayError::UpstreamUnavailable(format!("upstream request failed: {}", e))
        })?;

        let status = res.status();
        if status == StatusCode::FORBIDDEN {
            return Err(RelayError::blocked_by_bot_check());
        }
        if !status.is_success() {
            return Err(RelayError::UpstreamUnavailable(format!(
                "upstream returned {}",
                status
            )));
        }

        let content_length = res.content_length();
        let content_range = res
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(UpstreamStream {
            content_length,
            content_range,
            bytes: res
                .bytes_stream()
                .map_err(|e| Box::new(e) as AnyError)
                .boxed(),
        })
    }
}

fn parse_player_response(body: &Value) -> Result<Vec<StreamFormat>, RelayError> {
    let playability = body
        .pointer("/playabilityStatus/status")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN");

    if playability != "OK" {
        let reason = body
            .pointer("/playabilityStatus/reason")
            .and_then(Value::as_str)
            .unwrap_or("no reason provided");
        return Err(classify_playability(playability, reason));
    }

    let streaming_data = body.get("streamingData").ok_or_else(|| {
        RelayError::VideoUnavailable("player response carried no streamingData".to_string())
    })?;

    let adaptive = streaming_data
        .get("adaptiveFormats")
        .and_then(Value::as_array);
    let muxed = streaming_data.get("formats").and_then(Value::as_array);

    let mut formats = Vec::new();
    for f in adaptive.into_iter().flatten().chain(muxed.into_iter().flatten()) {
        // Entries without a plain url are signatureCipher-protected and
        // cannot be opened from the Android context.
        let Some(url) = f.get("url").and_then(Value::as_str) else {
            continue;
        };

        let mime = f
            .get("mimeType")
            .and_then(Value::as_str)
            .unwrap_or("application/octet-stream");

        formats.push(StreamFormat {
            itag: f.get("itag").and_then(Value::as_i64),
            mime_type: mime.to_string(),
            codec: codec_from_mime(mime),
            container: AudioContainer::from_mime(mime),
            bitrate: f.get("bitrate").and_then(Value::as_i64),
            content_length: f
                .get("contentLength")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
            handle: url.to_string(),
        });
    }

    Ok(formats)
}

fn classify_playability(status: &str, reason: &str) -> RelayError {
    let reason_lower = reason.to_lowercase();
    let bot_check =
        reason_lower.contains("not a bot") || reason_lower.contains("sign in to confirm");

    match status {
        "LOGIN_REQUIRED" if bot_check => RelayError::blocked_by_bot_check(),
        _ => RelayError::VideoUnavailable(format!("{} ({})", reason, status)),
    }
}

fn codec_from_mime(mime: &str) -> Option<String> {
    mime.split("codecs=\"")
        .nth(1)
        .and_then(|s| s.split('"').next())
        .map(String::from)
}
