use serde::{Deserialize, Serialize};

/// Quality hints accepted by the HTTP layer, matching the ladder most
/// upstream services expose.
pub const SUPPORTED_QUALITIES: &[&str] = &[
    "144", "240", "360", "480", "540", "720", "1080", "1440", "2160", "best", "worst",
];

/// One resolution attempt as seen by the orchestrator. Immutable once built.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub source_url: String,
    pub format_hint: Option<String>,
}

impl ResolutionRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            format_hint: None,
        }
    }

    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = Some(hint.into());
        self
    }

    pub fn quality(&self) -> &str {
        self.format_hint.as_deref().unwrap_or("best")
    }
}

/// Successful resolution: enough information for a client to fetch the media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resolved_url: String,
    /// Container extension or mime subtype, e.g. "mp4".
    pub format: String,
    pub title: Option<String>,
    pub size_bytes: Option<u64>,
    pub duration: Option<u64>,
    /// Which backend produced this descriptor.
    pub backend_id: String,
}

/// One selectable variant of a resource, as reported by a backend.
#[derive(Debug, Clone)]
pub struct MediaFormat {
    pub url: String,
    pub ext: String,
    pub height: Option<u32>,
    pub bitrate: Option<f64>,
    pub filesize: Option<u64>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// Pick the variant that best satisfies the quality hint. Formats carrying
/// both audio and video are preferred; audio-only or video-only streams are
/// a fallback when nothing combined is available.
pub fn select_format<'a>(formats: &'a [MediaFormat], hint: &str) -> Option<&'a MediaFormat> {
    let mut pool: Vec<&MediaFormat> = formats
        .iter()
        .filter(|f| f.has_video && f.has_audio)
        .collect();
    if pool.is_empty() {
        pool = formats.iter().collect();
    }

    match hint {
        "" | "best" => pool.into_iter().max_by_key(|f| format_score(f)),
        "worst" => pool.into_iter().min_by_key(|f| format_score(f)),
        height => match height.trim_end_matches('p').parse::<u32>() {
            Ok(cap) => {
                let mut capped: Vec<&MediaFormat> = pool
                    .iter()
                    .filter(|f| f.height.is_some_and(|h| h <= cap))
                    .copied()
                    .collect();
                // Nothing at or below the requested height: serve what exists
                // rather than failing the whole resolution.
                if capped.is_empty() {
                    capped = pool;
                }
                capped
                    .into_iter()
                    .max_by_key(|f| (f.height.unwrap_or(0), format_score(f)))
            }
            Err(_) => pool.into_iter().max_by_key(|f| format_score(f)),
        },
    }
}

fn format_score(format: &MediaFormat) -> i64 {
    // Prefer mp4 containers, then overall bitrate
    let container = match format.ext.as_str() {
        "mp4" | "m4a" => 1000,
        "webm" => 500,
        _ => 0,
    };
    container + format.bitrate.unwrap_or(0.0) as i64
}
