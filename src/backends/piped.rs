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

/// Resolves through a configured Piped API instance. Independent
/// infrastructure from Invidious, so the two rarely fail together.
pub struct PipedBackend {
    id: String,
    endpoint: String,
    client: reqwest::Client,
}

impl PipedBackend {
    pub fn new(id: &str, endpoint: &str, user_agent: &str, timeout: Duration) -> Self {
        Self {
            id: id.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: build_client(user_agent, timeout),
        }
    }

    fn parse_formats(payload: &Value) -> Vec<MediaFormat> {
        let mut formats = Vec::new();

        if let Some(entries) = payload.get("videoStreams").and_then(|v| v.as_array()) {
            for entry in entries {
                let Some(url) = entry.get("url").and_then(|v| v.as_str()) else {
                    continue;
                };
                let mime = entry.get("mimeType").and_then(|v| v.as_str()).unwrap_or("");
                let video_only = entry
                    .get("videoOnly")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);

                formats.push(MediaFormat {
                    url: url.to_string(),
                    ext: ext_from_mime(mime).unwrap_or_else(|| "mp4".to_string()),
                    height: entry
                        .get("quality")
                        .and_then(|v| v.as_str())
                        .and_then(parse_height)
                        .or_else(|| entry.get("height").and_then(|v| v.as_u64()).map(|h| h as u32)),
                    bitrate: entry.get("bitrate").and_then(|v| v.as_f64()),
                    filesize: entry.get("contentLength").and_then(|v| v.as_u64()),
                    has_video: true,
                    has_audio: !video_only,
                });
            }
        }

        if let Some(entries) = payload.get("audioStreams").and_then(|v| v.as_array()) {
            for entry in entries {
                let Some(url) = entry.get("url").and_then(|v| v.as_str()) else {
                    continue;
                };
                let mime = entry.get("mimeType").and_then(|v| v.as_str()).unwrap_or("");

                formats.push(MediaFormat {
                    url: url.to_string(),
                    ext: ext_from_mime(mime).unwrap_or_else(|| "m4a".to_string()),
                    height: None,
                    bitrate: entry.get("bitrate").and_then(|v| v.as_f64()),
                    filesize: entry.get("contentLength").and_then(|v| v.as_u64()),
                    has_video: false,
                    has_audio: true,
                });
            }
        }

        formats
    }
}

#[async_trait]
impl Backend for PipedBackend {
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
            "{}/streams/{}",
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

        // Piped reports extraction problems inside a 200 body
        if let Some(error) = payload.get("error").and_then(|v| v.as_str()) {
            return Err(BackendError::upstream(
                &self.id,
                format!("instance error: {error}"),
            ));
        }

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
            duration: payload.get("duration").and_then(|v| v.as_u64()),
            backend_id: self.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_only_streams_lose_audio_flag() {
        let payload: Value = serde_json::from_str(
            r#"{
                "title": "Test",
                "videoStreams": [
                    {"url": "https://host/muxed", "mimeType": "video/mp4", "quality": "720p", "videoOnly": false, "bitrate": 900000},
                    {"url": "https://host/video-only", "mimeType": "video/webm", "quality": "1080p", "videoOnly": true}
                ],
                "audioStreams": [
                    {"url": "https://host/audio", "mimeType": "audio/mp4", "bitrate": 128000}
                ]
            }"#,
        )
        .unwrap();

        let formats = PipedBackend::parse_formats(&payload);
        assert_eq!(formats.len(), 3);
        assert!(formats[0].has_audio);
        assert!(!formats[1].has_audio);
        assert_eq!(formats[1].height, Some(1080));
        assert!(!formats[2].has_video);

        // the muxed stream wins for "best"
        let best = select_format(&formats, "best").unwrap();
        assert_eq!(best.url, "https://host/muxed");
    }
}
