use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::backends::{
    build_client, classify_request_error, classify_status, extract_video_id, supported_host,
};
use crate::core::{
    select_format, Backend, BackendError, MediaFormat, ResolutionRequest, ResourceDescriptor,
};

/// Resolves by fetching the public watch page and reading the player
/// response JSON embedded in it. Cheapest route when it works, and the one
/// most exposed to site-layout changes, so it reports Unsupported rather
/// than guessing when the page shape moves.
pub struct ScrapeBackend {
    id: String,
    client: reqwest::Client,
}

impl ScrapeBackend {
    pub fn new(id: &str, user_agent: &str, timeout: Duration) -> Self {
        Self {
            id: id.to_string(),
            client: build_client(user_agent, timeout),
        }
    }

    fn extract_player_response(&self, html: &str) -> Result<Value, BackendError> {
        // The page has carried the JSON under a few different spellings over
        // time; try them all before giving up.
        let patterns = [
            r#"var\s+ytInitialPlayerResponse\s*=\s*(\{.+?\});"#,
            r#"ytInitialPlayerResponse\s*=\s*(\{.+?\});"#,
            r#"ytInitialPlayerResponse":\s*(\{.+?\})"#,
        ];

        for pattern in &patterns {
            if let Ok(re) = Regex::new(pattern) {
                if let Some(captures) = re.captures(html) {
                    if let Some(json_str) = captures.get(1) {
                        match serde_json::from_str::<Value>(json_str.as_str()) {
                            Ok(parsed) => return Ok(parsed),
                            Err(_) => continue, // try next pattern
                        }
                    }
                }
            }
        }

        Err(BackendError::unsupported(
            &self.id,
            "no player response found in watch page",
        ))
    }

    fn parse_formats(streaming_data: &Value) -> Vec<MediaFormat> {
        let mut formats = Vec::new();

        for key in ["formats", "adaptiveFormats"] {
            let Some(entries) = streaming_data.get(key).and_then(|v| v.as_array()) else {
                continue;
            };

            for entry in entries {
                // Cipher-protected formats need player JS evaluation, which
                // this backend does not attempt; another backend can still
                // serve the URL.
                let Some(url) = entry.get("url").and_then(|v| v.as_str()) else {
                    continue;
                };

                let mime = entry
                    .get("mimeType")
                    .and_then(|v| v.as_str())
                    .unwrap_or("video/mp4");
                let ext = super::ext_from_mime(mime).unwrap_or_else(|| "mp4".to_string());

                formats.push(MediaFormat {
                    url: url.to_string(),
                    ext,
                    height: entry.get("height").and_then(|v| v.as_u64()).map(|h| h as u32),
                    bitrate: entry.get("bitrate").and_then(|v| v.as_f64()),
                    filesize: entry
                        .get("contentLength")
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse().ok()),
                    has_video: mime.starts_with("video/"),
                    // Combined "formats" entries always carry an audio track
                    has_audio: key == "formats" || mime.starts_with("audio/"),
                });
            }
        }

        formats
    }
}

#[async_trait]
impl Backend for ScrapeBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn suitable(&self, url: &Url) -> bool {
        supported_host(url)
    }

    async fn resolve(
        &self,
        url: &Url,
        request: &ResolutionRequest,
    ) -> Result<ResourceDescriptor, BackendError> {
        let video_id = extract_video_id(url)
            .ok_or_else(|| BackendError::unsupported(&self.id, "no video id in URL"))?;

        let watch_url = format!(
            "https://www.youtube.com/watch?v={}",
            urlencoding::encode(&video_id)
        );
        debug!("Fetching watch page {}", watch_url);

        let response = self
            .client
            .get(&watch_url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| classify_request_error(&self.id, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&self.id, status));
        }

        let html = response
            .text()
            .await
            .map_err(|e| classify_request_error(&self.id, &e))?;

        let player_response = self.extract_player_response(&html)?;

        if let Some(playability) = player_response.get("playabilityStatus") {
            let playable = playability
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("OK");
            if playable != "OK" {
                let reason = playability
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or(playable);
                return Err(BackendError::unsupported(
                    &self.id,
                    format!("video not playable: {reason}"),
                ));
            }
        }

        let streaming_data = player_response.get("streamingData").ok_or_else(|| {
            BackendError::upstream(&self.id, "player response has no streaming data")
        })?;

        let formats = Self::parse_formats(streaming_data);
        debug!("Watch page yielded {} direct-URL formats", formats.len());

        let format = select_format(&formats, request.quality()).ok_or_else(|| {
            BackendError::unsupported(&self.id, "only signature-protected formats available")
        })?;

        let video_details = player_response.get("videoDetails");

        Ok(ResourceDescriptor {
            resolved_url: format.url.clone(),
            format: format.ext.clone(),
            title: video_details
                .and_then(|d| d.get("title"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            size_bytes: format.filesize,
            duration: video_details
                .and_then(|d| d.get("lengthSeconds"))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok()),
            backend_id: self.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_response_extraction() {
        let backend = ScrapeBackend::new("scrape", "test", Duration::from_secs(5));

        let html = r#"<script>var ytInitialPlayerResponse = {"videoDetails":{"title":"Test"}};</script>"#;
        let parsed = backend.extract_player_response(html).unwrap();
        assert_eq!(
            parsed["videoDetails"]["title"].as_str(),
            Some("Test")
        );

        let err = backend.extract_player_response("<html>nothing</html>").unwrap_err();
        assert_eq!(err.kind, crate::core::ErrorKind::Unsupported);
    }

    #[test]
    fn test_cipher_formats_are_skipped() {
        let streaming_data: Value = serde_json::from_str(
            r#"{
                "formats": [
                    {"signatureCipher": "s=abc&url=https%3A%2F%2Fcdn%2Fa", "mimeType": "video/mp4"},
                    {"url": "https://cdn/direct", "mimeType": "video/mp4; codecs=\"avc1\"", "height": 360, "bitrate": 500000}
                ]
            }"#,
        )
        .unwrap();

        let formats = ScrapeBackend::parse_formats(&streaming_data);
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].url, "https://cdn/direct");
        assert_eq!(formats[0].ext, "mp4");
        assert!(formats[0].has_audio);
        assert_eq!(formats[0].height, Some(360));
    }
}
