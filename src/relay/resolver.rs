use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::common::errors::RelayError;
use crate::common::types::VideoId;
use crate::configs::RelayConfig;
use crate::extractor::{ExtractionBackend, StreamFormat};
use crate::relay::url::extract_video_id;

/// Optional TTL cache for manifest-fetch results. Disabled (ttl `None`)
/// unless `[relay].manifest_cache_secs` is set; per-session format choice is
/// unaffected either way.
pub struct ManifestCache {
    ttl: Option<Duration>,
    entries: DashMap<String, (Instant, Arc<Vec<StreamFormat>>)>,
}

impl ManifestCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    fn get(&self, video_id: &VideoId) -> Option<Arc<Vec<StreamFormat>>> {
        let ttl = self.ttl?;
        let entry = self.entries.get(video_id.0.as_str())?;
        let (fetched_at, formats) = entry.value();
        (fetched_at.elapsed() < ttl).then(|| formats.clone())
    }

    fn insert(&self, video_id: &VideoId, formats: Arc<Vec<StreamFormat>>) {
        if self.ttl.is_some() {
            self.entries
                .insert(video_id.to_string(), (Instant::now(), formats));
        }
    }
}

/// Resolve a canonical URL to its audio-only manifest, in manifest order.
pub async fn audio_manifest(
    backend: &dyn ExtractionBackend,
    config: &RelayConfig,
    cache: &ManifestCache,
    canonical: &str,
) -> Result<(VideoId, Vec<StreamFormat>), RelayError> {
    if !backend.can_handle(canonical) {
        return Err(RelayError::InvalidUrl(canonical.to_string()));
    }
    let video_id =
        extract_video_id(canonical).ok_or_else(|| RelayError::InvalidUrl(canonical.to_string()))?;

    let manifest = match cache.get(&video_id) {
        Some(cached) => cached,
        None => {
            let fetched = Arc::new(fetch_with_retry(backend, config, &video_id).await?);
            cache.insert(&video_id, fetched.clone());
            fetched
        }
    };

    let audio: Vec<StreamFormat> = manifest
        .iter()
        .filter(|f| f.is_audio_only())
        .cloned()
        .collect();

    Ok((video_id, audio))
}

/// Resolve a canonical URL to the one format a relay session will stream.
pub async fn resolve(
    backend: &dyn ExtractionBackend,
    config: &RelayConfig,
    cache: &ManifestCache,
    canonical: &str,
) -> Result<(VideoId, StreamFormat), RelayError> {
    let (video_id, audio) = audio_manifest(backend, config, cache, canonical).await?;
    let chosen = select_audio_format(&audio).ok_or(RelayError::NoAudioStream)?;

    tracing::debug!(
        "Resolved {} to itag={:?} mime={} via {}",
        video_id,
        chosen.itag,
        chosen.mime_type,
        backend.name()
    );

    Ok((video_id, chosen.clone()))
}

/// Deterministic preference: `audio/mp4` plays everywhere, so it wins when
/// present; otherwise the first audio-only entry in manifest order (every
/// video exposes at least one WebM/Opus rendition).
pub fn select_audio_format(audio_only: &[StreamFormat]) -> Option<&StreamFormat> {
    audio_only
        .iter()
        .find(|f| f.content_type() == "audio/mp4")
        .or_else(|| audio_only.first())
}

async fn fetch_with_retry(
    backend: &dyn ExtractionBackend,
    config: &RelayConfig,
    video_id: &VideoId,
) -> Result<Vec<StreamFormat>, RelayError> {
    let attempts = config.manifest_retries.saturating_add(1);
    let mut last_err = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            tracing::debug!("Retrying manifest fetch for {} ({})", video_id, attempt);
        }

        match tokio::time::timeout(config.manifest_timeout(), backend.fetch_manifest(video_id))
            .await
        {
            Ok(Ok(manifest)) => return Ok(manifest),
            Ok(Err(e)) if e.is_retryable() => last_err = Some(e),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                last_err = Some(RelayError::UpstreamUnavailable(format!(
                    "manifest request timed out after {}s",
                    config.manifest_timeout_secs
                )))
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| RelayError::UpstreamUnavailable("manifest fetch failed".to_string())))
}
