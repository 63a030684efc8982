use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::acquire::RetryPolicy;
use crate::error::{Result, ServiceError};

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct TextClient {
    api_key: String,
    endpoint: String,
    model: String,
    retry: RetryPolicy,
    client: Client,
}

impl TextClient {
    pub fn new(api_key: String, api_base: &str, model: String, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            api_key,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            model,
            retry,
            client,
        })
    }

    /// Ask the model for a narrated script with the four section markers.
    pub async fn generate_content(&self, topic: &str, duration_secs: u32) -> Result<String> {
        info!("Generating video content for topic: {}", topic);

        let prompt = content_prompt(topic, duration_secs);
        let text = self
            .retry
            .run("Text generation", || self.complete(&prompt))
            .await?;

        info!("Generated content: {} characters", text.len());
        Ok(text)
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, ServiceError> {
        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(ServiceError::from_response(status.as_u16(), &error_text));
        }

        let response_json: serde_json::Value = response.json().await?;
        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::malformed("Failed to extract generated text"))
    }
}

fn content_prompt(topic: &str, duration_secs: u32) -> String {
    format!(
        r#"Write a short video about the following topic, about {duration} seconds long.

Topic: {topic}

Answer with exactly these four sections, each introduced by its heading on its own line:

## SCRIPT
Narration split into scenes of five seconds. Start every scene with a timestamp like [00:00], [00:05], [00:10].

## VISUAL SCENES
One bullet per scene, in the same order, written as:
*   **Visuals:** a detailed description of what is on screen
Use "**B-roll:**" instead of "**Visuals:**" for supporting footage.

## MUSIC RECOMMENDATIONS
Two or three background music suggestions.

## THUMBNAIL CONCEPT
One paragraph describing the thumbnail.

Do not add any other commentary."#,
        duration = duration_secs,
        topic = topic
    )
}
