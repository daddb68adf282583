use reqwest::Url;

use crate::common::errors::RelayError;
use crate::common::types::VideoId;

/// Canonicalize the accepted YouTube URL variants to
/// `https://www.youtube.com/watch?v=<id>`.
///
/// Pure and idempotent: a canonical URL maps to itself. Anything that parses
/// but matches no rewrite rule passes through unchanged; the backend grammar
/// check rejects it downstream.
pub fn normalize(raw: &str) -> Result<String, RelayError> {
    let raw = raw.trim();
    let parsed = Url::parse(raw).map_err(|_| RelayError::InvalidUrl(raw.to_string()))?;
    let host = parsed.host_str().unwrap_or_default();

    // Short link: the id is the first path segment.
    if host == "youtu.be" {
        if let Some(id) = parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|s| !s.is_empty())
        {
            return Ok(watch_url(id));
        }
    }

    // www. / m. / music. subdomains all collapse onto the main watch URL.
    if host.contains(".youtube.") {
        if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
            return Ok(watch_url(&v));
        }
    }

    Ok(raw.to_string())
}

/// Pull the 11-character video id out of any accepted URL shape.
pub fn extract_video_id(url: &str) -> Option<VideoId> {
    let parsed = Url::parse(url).ok()?;

    if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
        return VideoId::parse(&v);
    }

    let host = parsed.host_str().unwrap_or_default();
    let mut segments = parsed.path_segments()?;

    if host == "youtu.be" {
        return VideoId::parse(segments.next()?);
    }

    // Live and shorts URLs put the id one segment deeper.
    match segments.next()? {
        "live" | "shorts" | "embed" => VideoId::parse(segments.next()?),
        _ => None,
    }
}

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[test]
    fn all_variants_collapse_to_one_canonical_form() {
        let variants = [
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
        ];
        for variant in variants {
            assert_eq!(normalize(variant).unwrap(), CANONICAL, "from {}", variant);
        }
    }

    #[test]
    fn extra_query_parameters_are_dropped() {
        assert_eq!(
            normalize("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s&list=PL123").unwrap(),
            CANONICAL
        );
        assert_eq!(
            normalize("https://youtu.be/dQw4w9WgXcQ?si=share-token").unwrap(),
            CANONICAL
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "https://youtu.be/dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://example.com/somewhere",
        ];
        for input in inputs {
            let once = normalize(input).unwrap();
            assert_eq!(normalize(&once).unwrap(), once, "from {}", input);
        }
    }

    #[test]
    fn non_youtube_urls_pass_through() {
        let url = "https://example.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(normalize(url).unwrap(), url);
    }

    #[test]
    fn unparseable_input_is_rejected() {
        assert!(matches!(normalize("not a url"), Err(RelayError::InvalidUrl(_))));
        assert!(matches!(normalize(""), Err(RelayError::InvalidUrl(_))));
    }

    #[test]
    fn video_id_extraction() {
        assert_eq!(
            extract_video_id(CANONICAL).unwrap().to_string(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap().to_string(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ")
                .unwrap()
                .to_string(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/live/dQw4w9WgXcQ")
                .unwrap()
                .to_string(),
            "dQw4w9WgXcQ"
        );
        assert!(extract_video_id("https://www.youtube.com/watch?v=bogus").is_none());
        assert!(extract_video_id("https://www.youtube.com/feed/library").is_none());
    }
}
