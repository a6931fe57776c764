mod invidious;
mod piped;
mod scrape;

pub use invidious::InvidiousBackend;
pub use piped::PipedBackend;
pub use scrape::ScrapeBackend;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::config::{BackendKind, Config};
use crate::core::{Backend, BackendError};

/// Instantiate every enabled backend from the configuration, paired with its
/// priority for registry construction.
pub fn build_backends(config: &Config) -> Result<Vec<(i32, Arc<dyn Backend>)>> {
    let timeout = Duration::from_secs(config.resolve_timeout);
    let mut backends: Vec<(i32, Arc<dyn Backend>)> = Vec::new();

    for entry in &config.backends {
        if !entry.enabled {
            continue;
        }

        let backend: Arc<dyn Backend> = match entry.kind {
            BackendKind::Scrape => {
                Arc::new(ScrapeBackend::new(&entry.id, &config.user_agent, timeout))
            }
            BackendKind::Invidious => {
                let endpoint = entry
                    .endpoint
                    .as_deref()
                    .with_context(|| format!("backend {} requires an endpoint", entry.id))?;
                Arc::new(InvidiousBackend::new(
                    &entry.id,
                    endpoint,
                    &config.user_agent,
                    timeout,
                ))
            }
            BackendKind::Piped => {
                let endpoint = entry
                    .endpoint
                    .as_deref()
                    .with_context(|| format!("backend {} requires an endpoint", entry.id))?;
                Arc::new(PipedBackend::new(
                    &entry.id,
                    endpoint,
                    &config.user_agent,
                    timeout,
                ))
            }
        };

        backends.push((entry.priority, backend));
    }

    Ok(backends)
}

/// Pull the video id out of the URL shapes we accept.
pub(crate) fn extract_video_id(url: &Url) -> Option<String> {
    if url.host_str() == Some("youtu.be") {
        return url
            .path_segments()?
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
    }

    if let Some(host) = url.host_str() {
        if host == "youtube.com" || host.ends_with(".youtube.com") {
            if let Some((_, v)) = url.query_pairs().find(|(key, _)| key == "v") {
                return Some(v.to_string());
            }
            // /shorts/<id> and /embed/<id> pages carry the id in the path
            let mut segments = url.path_segments()?;
            if let Some("shorts" | "embed") = segments.next() {
                return segments.next().filter(|s| !s.is_empty()).map(|s| s.to_string());
            }
        }
    }

    None
}

pub(crate) fn supported_host(url: &Url) -> bool {
    extract_video_id(url).is_some()
}

/// Map a transport-level failure onto the shared error taxonomy.
pub(crate) fn classify_request_error(backend_id: &str, err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::timeout(backend_id, err.to_string())
    } else if err.is_connect() {
        BackendError::upstream(backend_id, format!("connection failed: {err}"))
    } else {
        BackendError::upstream(backend_id, err.to_string())
    }
}

/// Map a non-success HTTP status onto the shared error taxonomy.
pub(crate) fn classify_status(backend_id: &str, status: reqwest::StatusCode) -> BackendError {
    match status.as_u16() {
        429 => BackendError::rate_limited(backend_id, "upstream rate limit (HTTP 429)"),
        s if status.is_server_error() => {
            BackendError::upstream(backend_id, format!("upstream error: HTTP {s}"))
        }
        s => BackendError::unsupported(backend_id, format!("upstream rejected the request: HTTP {s}")),
    }
}

/// "720p" / "720" style labels into a pixel height.
pub(crate) fn parse_height(label: &str) -> Option<u32> {
    label.trim_end_matches('p').parse().ok()
}

/// Container extension from a mime type like "video/mp4; codecs=...".
pub(crate) fn ext_from_mime(mime: &str) -> Option<String> {
    let subtype = mime.split('/').nth(1)?;
    let subtype = subtype.split(';').next().unwrap_or(subtype).trim();
    if subtype.is_empty() {
        None
    } else {
        Some(subtype.to_string())
    }
}

pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_video_id_extraction() {
        let cases = vec![
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://youtu.be/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://m.youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=123", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/shorts/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/embed/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
        ];

        for (url, expected) in cases {
            assert_eq!(extract_video_id(&parse(url)), Some(expected.to_string()));
        }

        assert_eq!(extract_video_id(&parse("https://vimeo.com/123456")), None);
        assert_eq!(extract_video_id(&parse("https://example.com")), None);
        assert_eq!(extract_video_id(&parse("https://notyoutube.com/watch?v=x")), None);
    }

    #[test]
    fn test_status_classification() {
        use crate::core::ErrorKind;

        let kind = |code: u16| {
            classify_status("test", reqwest::StatusCode::from_u16(code).unwrap()).kind
        };

        assert_eq!(kind(429), ErrorKind::RateLimited);
        assert_eq!(kind(500), ErrorKind::UpstreamError);
        assert_eq!(kind(503), ErrorKind::UpstreamError);
        assert_eq!(kind(404), ErrorKind::Unsupported);
        assert_eq!(kind(403), ErrorKind::Unsupported);
    }

    #[test]
    fn test_mime_and_height_parsing() {
        assert_eq!(ext_from_mime("video/mp4; codecs=\"avc1\""), Some("mp4".to_string()));
        assert_eq!(ext_from_mime("audio/webm"), Some("webm".to_string()));
        assert_eq!(ext_from_mime("garbage"), None);

        assert_eq!(parse_height("720p"), Some(720));
        assert_eq!(parse_height("1080"), Some(1080));
        assert_eq!(parse_height("unknown"), None);
    }
}
