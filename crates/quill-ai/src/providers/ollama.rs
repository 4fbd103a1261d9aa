use std::time::Duration;

use async_trait::async_trait;
use quill_core::{ChatMessage, ChatRequest};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{providers::ChatClient, AiError};

#[derive(Clone)]
pub struct OllamaProvider {
    base_url: Url,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(
        base_url: Url,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url,
            model: model.into(),
            timeout,
            client,
        })
    }
}

pub(crate) fn ollama_endpoint(base_url: &Url, path: &str) -> Result<Url, AiError> {
    let base_str = base_url.as_str().trim_end_matches('/').to_string();
    let base = Url::parse(&format!("{base_str}/"))?;
    Ok(base.join(path.trim_start_matches('/'))?)
}

#[async_trait]
impl ChatClient for OllamaProvider {
    async fn chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<String, AiError> {
        let url = ollama_endpoint(&self.base_url, "/api/chat")?;
        let options = &request.options;
        let options = if options.max_output_tokens.is_some()
            || options.temperature.is_some()
            || !options.stop_sequences.is_empty()
            || options.frequency_penalty.is_some()
            || options.presence_penalty.is_some()
        {
            Some(OllamaOptions {
                num_predict: options.max_output_tokens,
                temperature: options.temperature,
                stop: &options.stop_sequences,
                frequency_penalty: options.frequency_penalty,
                presence_penalty: options.presence_penalty,
            })
        } else {
            None
        };
        let body = OllamaChatRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
            options,
        };

        let fut = async {
            let response = self
                .client
                .post(url)
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await?
                .error_for_status()?;

            let parsed: OllamaChatResponse = response.json().await?;
            let Some(message) = parsed.message else {
                return Err(AiError::UnexpectedResponse(
                    "missing message in Ollama chat response".into(),
                ));
            };
            Ok::<_, AiError>(message.content)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(AiError::Cancelled),
            res = fut => res,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions<'a>>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions<'a> {
    #[serde(rename = "num_predict", skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}
