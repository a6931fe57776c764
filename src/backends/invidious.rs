use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::backends::{
    build_client, classify_request_error, classify_status, ext_from_mime, extract_video_id,
    parse_height, supported_host,
};
use crate::core::{
    select_format, Backend, BackendError, MediaFormat, ResolutionRequest, ResourceDescriptor,
};

/// Resolves through the JSON API of a configured Invidious instance, which
/// keeps working when the watch page layout shifts underneath the scraper.
pub struct InvidiousBackend {
    id: String,
    endpoint: String,
    client: reqwest::Client,
}

impl InvidiousBackend {
    pub fn new(id: &str, endpoint: &str, user_agent: &str, timeout: Duration) -> Self {
        Self {
            id: id.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: build_client(user_agent, timeout),
        }
    }

    fn parse_formats(payload: &Value) -> Vec<MediaFormat> {
        let mut formats = Vec::new();

        for key in ["formatStreams", "adaptiveFormats"] {
            let Some(entries) = payload.get(key).and_then(|v| v.as_array()) else {
                continue;
            };
            // formatStreams are muxed; adaptiveFormats split audio and video
            let combined = key == "formatStreams";

            for entry in entries {
                let Some(url) = entry.get("url").and_then(|v| v.as_str()) else {
                    continue;
                };

                let mime = entry.get("type").and_then(|v| v.as_str()).unwrap_or("");
                let ext = entry
                    .get("container")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .or_else(|| ext_from_mime(mime))
                    .unwrap_or_else(|| "mp4".to_string());

                formats.push(MediaFormat {
                    url: url.to_string(),
                    ext,
                    height: entry
                        .get("resolution")
                        .and_then(|v| v.as_str())
                        .and_then(parse_height),
                    bitrate: number_field(entry.get("bitrate")),
                    filesize: entry
                        .get("clen")
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse().ok()),
                    has_video: combined || mime.starts_with("video/"),
                    has_audio: combined || mime.starts_with("audio/"),
                });
            }
        }

        formats
    }
}

// Invidious reports some numeric fields as JSON strings.
fn number_field(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[async_trait]
impl Backend for InvidiousBackend {
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

        let api_url = format!(
            "{}/api/v1/videos/{}",
            self.endpoint,
            urlencoding::encode(&video_id)
        );
        debug!("Querying {}", api_url);

        let response = self
            .client
            .get(&api_url)
            .send()
            .await
            .map_err(|e| classify_request_error(&self.id, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&self.id, status));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| BackendError::upstream(&self.id, format!("invalid JSON payload: {e}")))?;

        let formats = Self::parse_formats(&payload);
        debug!("Instance returned {} usable formats", formats.len());

        let format = select_format(&formats, request.quality())
            .ok_or_else(|| BackendError::upstream(&self.id, "no playable formats in response"))?;

        Ok(ResourceDescriptor {
            resolved_url: format.url.clone(),
            format: format.ext.clone(),
            title: payload
                .get("title")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            size_bytes: format.filesize,
            duration: payload.get("lengthSeconds").and_then(|v| v.as_u64()),
            backend_id: self.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing_merges_both_lists() {
        let payload: Value = serde_json::from_str(
            r#"{
                "title": "Test",
                "formatStreams": [
                    {"url": "https://host/muxed", "type": "video/mp4; codecs=\"avc1\"", "resolution": "360p", "bitrate": "600000"}
                ],
                "adaptiveFormats": [
                    {"url": "https://host/audio", "type": "audio/webm; codecs=\"opus\"", "bitrate": "128000", "clen": "123456"},
                    {"type": "video/mp4", "resolution": "1080p"}
                ]
            }"#,
        )
        .unwrap();

        let formats = InvidiousBackend::parse_formats(&payload);
        // entry without a url is dropped
        assert_eq!(formats.len(), 2);

        assert!(formats[0].has_video && formats[0].has_audio);
        assert_eq!(formats[0].height, Some(360));
        assert_eq!(formats[0].bitrate, Some(600000.0));

        assert!(!formats[1].has_video && formats[1].has_audio);
        assert_eq!(formats[1].filesize, Some(123456));
    }
}
