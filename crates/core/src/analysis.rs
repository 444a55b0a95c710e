use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    error::{AnalysisError, ProviderError},
    format::format_timestamp,
    provider::Provider,
    types::{AnalysisResult, Frame},
};

static ANALYSIS_PROMPT: &str = r#"You are a video content analyzer. You receive still frames sampled evenly from one video, in order, each labelled with its position in the video.

Describe the video as a whole. You MUST output ONLY valid JSON matching this exact structure (no markdown, no explanation):
{
  "title": "Short descriptive title for the video",
  "summary": "2-4 sentence summary of what happens in the video",
  "key_topics": ["topic1", "topic2", "topic3"],
  "key_moments": [
    {"timestamp_description": "MM:SS", "event_summary": "What happens at this point"}
  ]
}

Rules:
- key_topics: 3-7 short items
- key_moments: 3-8 items in chronological order, using the frame positions you were given
- Output ONLY the JSON, nothing else"#;

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, frames: &[Frame]) -> Result<AnalysisResult, AnalysisError>;

    /// Human-readable name of the backing service
    fn name(&self) -> &str {
        "analysis service"
    }
}

/// Client for OpenAI-compatible chat completion endpoints with image input
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    endpoint: String,
    model: String,
}

impl HttpAnalysisClient {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        let config = provider.config();
        Self {
            http: reqwest::Client::new(),
            provider,
            api_key: api_key.into(),
            endpoint: config.api_url.to_string(),
            model: config.model.to_string(),
        }
    }

    /// Build a client with the key taken from the provider's environment variable
    pub fn from_env(provider: Provider) -> Result<Self, ProviderError> {
        let api_key = provider.validate_api_key()?;
        Ok(Self::new(provider, api_key))
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, frames: &[Frame]) -> serde_json::Value {
        let mut content = Vec::with_capacity(frames.len() * 2 + 1);
        content.push(serde_json::json!({
            "type": "text",
            "text": format!("Analyze these {} frames from the video.", frames.len()),
        }));
        for frame in frames {
            content.push(serde_json::json!({
                "type": "text",
                "text": format!("Frame {} at {}", frame.index + 1, format_timestamp(frame.timestamp)),
            }));
            content.push(serde_json::json!({
                "type": "image_url",
                "image_url": { "url": frame.to_data_url() },
            }));
        }

        serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": ANALYSIS_PROMPT,
                },
                {
                    "role": "user",
                    "content": content,
                },
            ],
            "temperature": 0.2,
        })
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(&self, frames: &[Frame]) -> Result<AnalysisResult, AnalysisError> {
        if frames.is_empty() {
            return Err(AnalysisError::NoFrames);
        }

        info!(
            provider = self.provider.name(),
            model = %self.model,
            frames = frames.len(),
            "requesting analysis"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(frames))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let response = response.json::<serde_json::Value>().await?;
        debug!("analysis response received");
        parse_completion(&response)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Extract the structured result from a chat completion response
pub fn parse_completion(response: &serde_json::Value) -> Result<AnalysisResult, AnalysisError> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| AnalysisError::InvalidResponse {
            reason: format!("no message content in {}", response),
        })?;

    Ok(serde_json::from_str(strip_code_fence(content))?)
}

/// Models sometimes wrap JSON in a markdown fence despite being told not to
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.trim()
}
