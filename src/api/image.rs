use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Result, ServiceError};

/// Image data as returned by a generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ImagePayload {
    /// Remote image that still has to be downloaded
    Url(String),
    /// Base64-encoded raster (PNG or JPEG)
    Base64(String),
}

/// Remote text-to-image generation.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate(&self, prompt: &str) -> std::result::Result<ImagePayload, ServiceError>;
}

/// Client for an OpenAI-compatible `/images/generations` endpoint.
#[derive(Debug, Clone)]
pub struct HttpImageClient {
    api_key: String,
    endpoint: String,
    model: String,
    size: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageResult>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    url: Option<String>,
    b64_json: Option<String>,
}

impl HttpImageClient {
    pub fn new(api_key: String, api_base: &str, model: String, size: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            api_key,
            endpoint: format!("{}/images/generations", api_base.trim_end_matches('/')),
            model,
            size,
            client,
        })
    }
}

#[async_trait]
impl ImageService for HttpImageClient {
    async fn generate(&self, prompt: &str) -> std::result::Result<ImagePayload, ServiceError> {
        debug!("Requesting image for prompt: {}", prompt);

        let request_body = json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": self.size,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ServiceError::from_response(status.as_u16(), &body));
        }

        let payload = parse_image_response(&body)?;
        info!(
            "Received image ({})",
            match &payload {
                ImagePayload::Url(_) => "url",
                ImagePayload::Base64(_) => "inline",
            }
        );
        Ok(payload)
    }
}

fn parse_image_response(body: &str) -> std::result::Result<ImagePayload, ServiceError> {
    let parsed: ImageGenerationResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::malformed(format!("Failed to parse image response: {}", e)))?;

    let first = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::malformed("No image data in response"))?;

    match (first.b64_json, first.url) {
        (Some(data), _) if !data.is_empty() => Ok(ImagePayload::Base64(data)),
        (_, Some(url)) if !url.is_empty() => Ok(ImagePayload::Url(url)),
        _ => Err(ServiceError::malformed("Image result has neither url nor b64_json")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn prefers_inline_data() {
        let payload = parse_image_response(r#"{"data":[{"b64_json":"aGk=","url":"https://x"}]}"#);
        assert_eq!(payload.unwrap(), ImagePayload::Base64("aGk=".into()));
    }

    #[test]
    fn accepts_url_only() {
        let payload = parse_image_response(r#"{"data":[{"url":"https://img/1.png"}]}"#);
        assert_eq!(payload.unwrap(), ImagePayload::Url("https://img/1.png".into()));
    }

    #[test]
    fn missing_image_is_malformed() {
        for body in [r#"{"data":[]}"#, r#"{"data":[{}]}"#, r#"{"created":1}"#, "not json"] {
            let err = parse_image_response(body).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Malformed, "body: {}", body);
        }
    }
}
