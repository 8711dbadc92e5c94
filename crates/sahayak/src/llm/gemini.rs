//! Google Gemini provider over the `generateContent` REST endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{detect_rate_limit, ChatRole, LanguageModel, LlmError, LlmRequest};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const ENDPOINT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::NotConfigured);
        }
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let model = model.into();
        tracing::info!(model = %model, "creating Gemini provider (request timeout 30s)");
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", ENDPOINT_BASE, self.model)
    }

    fn build_body(request: &LlmRequest) -> serde_json::Value {
        let mut contents = Vec::with_capacity(request.history.len() + 1);
        for message in &request.history {
            let role = match message.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            contents.push(json!({
                "role": role,
                "parts": [{ "text": message.text }]
            }));
        }
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": request.user_text }]
        }));

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": request.max_output_tokens,
            }
        });
        if let Some(ref instruction) = request.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }
        body
    }
}

#[async_trait]
impl LanguageModel for GeminiProvider {
    async fn generate(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let endpoint = self.endpoint();
        let body = Self::build_body(request);

        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            if let Some(limited) = detect_rate_limit(Some(status.as_u16()), &error_body) {
                return Err(limited);
            }
            let preview: String = error_body.chars().take(300).collect();
            return Err(LlmError::Transport(format!(
                "Gemini API error ({status}): {preview}"
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| LlmError::MalformedResponse("no candidates in response".into()))
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: String,
}
