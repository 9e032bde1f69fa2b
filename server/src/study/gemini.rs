use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::generator::{ContentGenerator, GenerationRequest};
use crate::config::GeminiConfig;
use crate::error::StudyError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl From<GenerationRequest> for GenerateContentRequest {
    fn from(request: GenerationRequest) -> Self {
        GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: request.system_prompt,
                }],
            },
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: request.user_text,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.response_schema,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderError {
    message: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ProviderError>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, empty when missing
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .unwrap_or_default()
    }

    fn error_details(&self) -> String {
        self.error
            .as_ref()
            .and_then(|error| {
                error
                    .message
                    .clone()
                    .filter(|message| !message.is_empty())
                    .or_else(|| error.status.clone().filter(|status| !status.is_empty()))
            })
            .unwrap_or_else(|| String::from("Gemini request failed"))
    }
}

/// [ContentGenerator] backed by the Gemini `generateContent` endpoint
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    config: GeminiConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(GeminiGenerator { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, StudyError> {
        debug!(model = %self.config.model, "requesting content generation");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&GenerateContentRequest::from(request))
            .send()
            .await
            .map_err(|err| StudyError::Unreachable(err.without_url().to_string()))?;

        let status = response.status();
        // an unreadable body is treated like an empty one
        let payload: GenerateContentResponse = response.json().await.unwrap_or_default();

        if !status.is_success() {
            let details = payload.error_details();
            warn!(%status, %details, "content generation failed");
            return Err(StudyError::Upstream(details));
        }

        Ok(payload.into_text())
    }
}
