//! Google Gemini REST client for embeddings and text generation.
//!
//! - Auth via `?key=API_KEY` query parameter
//! - System instruction is a top-level `system_instruction` field
//! - Streaming uses `:streamGenerateContent?alt=sse`, decoded by `reqwest-eventsource`

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource, retry};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::config::ModelConfig;
use crate::domain::GenerationRequest;
use crate::error::{AvatarError, Result};
use crate::ports::{EmbeddingGenerator, TextGenerator};

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    generation_model: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
        })
    }

    fn endpoint_url(&self, model: &str, method: &str) -> String {
        let separator = if method.contains('?') { '&' } else { '?' };
        format!(
            "{}/models/{}:{}{}key={}",
            self.base_url, model, method, separator, self.api_key
        )
    }

    fn generation_body(request: &GenerationRequest) -> Value {
        json!({
            "system_instruction": {
                "parts": [{ "text": request.system_instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }]
        })
    }

    /// Concatenated text of the first candidate, or `None` if the payload
    /// carries no candidate text (e.g. a blocked prompt).
    fn candidate_text(body: &Value) -> Option<String> {
        let parts = body["candidates"].get(0)?["content"]["parts"].as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();
        Some(text)
    }

    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> AvatarError {
        match status.as_u16() {
            401 | 403 => AvatarError::MissingCredential(format!(
                "{} (Gemini rejected the API key)",
                crate::config::API_KEY_ENV
            )),
            _ => AvatarError::Generation(format!("HTTP {status} from Gemini API: {body_text}")),
        }
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        Ok(serde_json::from_str(&body_text)?)
    }
}

#[async_trait]
impl EmbeddingGenerator for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.endpoint_url(&self.embedding_model, "embedContent");
        let body = json!({
            "model": format!("models/{}", self.embedding_model),
            "content": { "parts": [{ "text": text }] }
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(AvatarError::Embedding(format!(
                "HTTP {status} from Gemini API: {body_text}"
            )));
        }

        let parsed: EmbedResponse = response.json().await?;
        Ok(parsed.embedding.values)
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = self.endpoint_url(&self.generation_model, "generateContent");
        tracing::debug!(model = self.generation_model.as_str(), "sending Gemini completion request");

        let body = self.post_json(&url, &Self::generation_body(request)).await?;
        Self::candidate_text(&body)
            .ok_or_else(|| AvatarError::Generation("Gemini response has no candidate text".to_string()))
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<()> {
        let url = self.endpoint_url(&self.generation_model, "streamGenerateContent?alt=sse");
        tracing::debug!(model = self.generation_model.as_str(), "sending Gemini streaming request");

        let builder = self.client.post(&url).json(&Self::generation_body(request));
        let mut source = EventSource::new(builder)
            .map_err(|e| AvatarError::Generation(format!("cannot open Gemini stream: {e}")))?;
        source.set_retry_policy(Box::new(retry::Never));

        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => {
                    if !forward_event(&message.data, &tx).await {
                        break;
                    }
                }
                Err(EventSourceError::StreamEnded) => break,
                Err(EventSourceError::InvalidStatusCode(status, response)) => {
                    source.close();
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Self::map_http_error(status, &body_text));
                }
                Err(e) => {
                    source.close();
                    return Err(AvatarError::Generation(format!("Gemini stream failed: {e}")));
                }
            }
        }

        source.close();
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.generation_model
    }
}

/// Sends the text of one SSE payload. Returns `false` once the receiver is gone.
async fn forward_event(data: &str, tx: &mpsc::Sender<String>) -> bool {
    match serde_json::from_str::<Value>(data) {
        Ok(json) => match GeminiClient::candidate_text(&json) {
            Some(text) if !text.is_empty() => tx.send(text).await.is_ok(),
            _ => true,
        },
        Err(e) => {
            let preview: String = data.chars().take(200).collect();
            tracing::warn!(error = %e, data_preview = preview.as_str(), "failed to parse Gemini SSE chunk");
            true
        }
    }
}
