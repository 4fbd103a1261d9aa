use std::time::Duration;

use async_trait::async_trait;
use quill_core::{ChatMessage, ChatRequest};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{providers::ChatClient, AiError};

#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    base_url: Url,
    model: String,
    timeout: Duration,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        base_url: Url,
        model: impl Into<String>,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self, AiError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.as_deref() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| AiError::InvalidConfig(e.to_string()))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url,
            model: model.into(),
            timeout,
            api_key,
            client,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }
}

/// Resolve an endpoint against a base URL that may or may not already carry
/// the `/v1` prefix.
///
/// Accepts both:
/// - `http://localhost:8000`     (we will append `/v1/...`)
/// - `http://localhost:8000/v1`  (we will append `/...`)
pub(crate) fn openai_compatible_endpoint(base_url: &Url, path: &str) -> Result<Url, AiError> {
    let base_str = base_url.as_str().trim_end_matches('/').to_string();
    let base = Url::parse(&format!("{base_str}/"))?;

    let base_path = base.path().trim_end_matches('/');
    if base_path.ends_with("/v1") {
        Ok(base.join(path.trim_start_matches('/'))?)
    } else {
        Ok(base.join(&format!("v1/{}", path.trim_start_matches('/')))?)
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatibleProvider {
    async fn chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<String, AiError> {
        let url = openai_compatible_endpoint(&self.base_url, "/chat/completions")?;
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.options.max_output_tokens,
            temperature: request.options.temperature,
            stop: &request.options.stop_sequences,
            frequency_penalty: request.options.frequency_penalty,
            presence_penalty: request.options.presence_penalty,
            stream: false,
        };

        let fut = async {
            let response = self
                .authorize(self.client.post(url))
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await?
                .error_for_status()?;

            let parsed: ChatCompletionResponse = response.json().await?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| {
                    AiError::UnexpectedResponse("missing choices[0].message.content".into())
                })?;
            Ok::<_, AiError>(content)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(AiError::Cancelled),
            res = fut => res,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}
