use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::io::ReaderStream;

use crate::common::errors::RelayError;
use crate::common::types::{AnyError, AudioContainer, VideoId};
use crate::extractor::{CredentialProvider, ExtractionBackend, StreamFormat, UpstreamStream};

/// Out-of-process extraction shelling out to yt-dlp.
///
/// Slower per request than the in-process backend but survives upstream
/// player changes as long as the installed yt-dlp does. Cannot serve byte
/// ranges: output arrives on the child's stdout as one forward-only pipe.
pub struct YtDlpBackend {
    program: String,
    url_regex: Regex,
    credentials: Arc<dyn CredentialProvider>,
}

impl YtDlpBackend {
    pub fn new(program: String, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            program,
            url_regex: Regex::new(r"(?:youtube\.com|youtu\.be)").expect("static regex"),
            credentials,
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-warnings").arg("--no-progress");
        // Children must not outlive their session: a dropped dump future or a
        // disconnected client reaps the process.
        cmd.kill_on_drop(true);
        if let Some(creds) = self.credentials.load() {
            cmd.arg("--cookies").arg(creds.cookies_path);
        }
        cmd
    }
}

#[async_trait]
impl ExtractionBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "ytdlp"
    }

    fn can_handle(&self, url: &str) -> bool {
        self.url_regex.is_match(url)
    }

    async fn fetch_manifest(&self, video_id: &VideoId) -> Result<Vec<StreamFormat>, RelayError> {
        let output = self
            .base_command()
            .arg("-J")
            .arg(video_id.watch_url())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                RelayError::UpstreamUnavailable(format!("could not run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("yt-dlp dump failed for {}: {}", video_id, stderr.trim());
            return Err(classify_failure(&stderr));
        }

        let dump: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            RelayError::UpstreamUnavailable(format!("yt-dlp dump was not JSON: {}", e))
        })?;

        Ok(parse_dump(&dump))
    }

    async fn open_stream(
        &self,
        video_id: &VideoId,
        format: &StreamFormat,
        _range: Option<&str>,
    ) -> Result<UpstreamStream, RelayError> {
        let mut child = self
            .base_command()
            .arg("-f")
            .arg(&format.handle)
            .arg("-o")
            .arg("-")
            .arg(video_id.watch_url())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RelayError::UpstreamUnavailable(format!("could not spawn {}: {}", self.program, e))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            RelayError::UpstreamUnavailable("yt-dlp child had no stdout".to_string())
        })?;

        if let Some(stderr) = child.stderr.take() {
            let id = video_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!("yt-dlp[{}]: {}", id, line);
                }
            });
        }

        // Moving the child into the stream ties its lifetime to the relay
        // session; kill_on_drop reaps it when the client goes away.
        let stream = ReaderStream::new(stdout)
            .map(|chunk| chunk.map_err(|e| Box::new(e) as AnyError));
        let bytes = futures::stream::unfold(
            (Box::pin(stream), child),
            |(mut stream, child)| async move {
                stream.next().await.map(|item| (item, (stream, child)))
            },
        )
        .boxed();

        Ok(UpstreamStream {
            content_length: format.content_length,
            content_range: None,
            bytes,
        })
    }
}

/// Map yt-dlp's `-J` dump into stream formats, keeping dump order.
fn parse_dump(dump: &Value) -> Vec<StreamFormat> {
    let mut out = Vec::new();

    for f in dump
        .get("formats")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(format_id) = f.get("format_id").and_then(Value::as_str) else {
            continue;
        };

        let acodec = f.get("acodec").and_then(Value::as_str).unwrap_or("none");
        let vcodec = f.get("vcodec").and_then(Value::as_str).unwrap_or("none");
        if acodec == "none" {
            continue;
        }

        let ext = f.get("ext").and_then(Value::as_str).unwrap_or("");
        let mime = mime_for(ext, vcodec != "none");

        out.push(StreamFormat {
            itag: format_id.parse().ok(),
            mime_type: mime.to_string(),
            codec: Some(acodec.to_string()),
            container: AudioContainer::from_mime(mime),
            bitrate: f
                .get("abr")
                .and_then(Value::as_f64)
                .map(|kbps| (kbps * 1000.0) as i64),
            content_length: f
                .get("filesize")
                .or_else(|| f.get("filesize_approx"))
                .and_then(Value::as_u64),
            handle: format_id.to_string(),
        });
    }

    out
}

fn mime_for(ext: &str, has_video: bool) -> &'static str {
    match (ext, has_video) {
        ("m4a", false) | ("mp4", false) => "audio/mp4",
        ("webm", false) | ("opus", false) => "audio/webm",
        ("mp3", false) => "audio/mpeg",
        ("mp4", true) | ("m4a", true) => "video/mp4",
        ("webm", true) => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Classify a failed yt-dlp run from its stderr.
fn classify_failure(stderr: &str) -> RelayError {
    let lower = stderr.to_lowercase();

    if lower.contains("sign in to confirm") || lower.contains("not a bot") {
        return RelayError::blocked_by_bot_check();
    }
    if lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("this video is not available")
        || lower.contains("members-only")
        || lower.contains("has been removed")
    {
        let detail = stderr
            .lines()
            .find(|l| l.contains("ERROR"))
            .unwrap_or("video unavailable")
            .trim();
        return RelayError::VideoUnavailable(detail.to_string());
    }

    RelayError::UpstreamUnavailable(format!("yt-dlp failed: {}", stderr.trim()))
}
