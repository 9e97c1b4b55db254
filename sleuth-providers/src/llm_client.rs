//! Chat-completions client for OpenRouter and other OpenAI-compatible APIs

use crate::http::{create_http_client, handle_response_error, is_transient, request_error};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use sleuth_core::{
    config_error, generation_error, retry_async, GenerationOptions, LlmConfig, RetryConfig,
    SleuthResult, TextGenerator,
};
use std::time::Instant;
use tracing::{debug, info};

const COMPONENT: &str = "openrouter_client";

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// `TextGenerator` backed by a `/chat/completions` endpoint
pub struct OpenRouterClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryConfig,
}

impl OpenRouterClient {
    /// Create a client from configuration. The API key comes from the config
    /// or `OPENROUTER_API_KEY`.
    pub fn new(config: &LlmConfig) -> SleuthResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| config_error!("OpenRouter API key not found", COMPONENT))?;

        let client = create_http_client(config.timeout_seconds, COMPONENT)?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "Created chat completions client"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn build_request(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            temperature: options.temperature.unwrap_or(self.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
        }
    }

    async fn send(
        client: reqwest::Client,
        url: String,
        api_key: String,
        request: ChatRequest,
    ) -> SleuthResult<ChatResponse> {
        let response = client
            .post(&url)
            .bearer_auth(&api_key)
            .header("HTTP-Referer", "https://github.com/sleuth-research/sleuth")
            .header("X-Title", "sleuth")
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(e, COMPONENT, "chat_completion"))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, COMPONENT).await);
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| request_error(e, COMPONENT, "decode_response"))
    }
}

/// First choice's message text
fn response_text(response: ChatResponse, model: &str) -> SleuthResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| generation_error!("Response contained no message content", COMPONENT, model))
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> SleuthResult<String> {
        let request = self.build_request(system_prompt, user_prompt, options);
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            model = %request.model,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            "Sending chat completion"
        );

        let start = Instant::now();
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let response = retry_async(
            || Self::send(client.clone(), url.clone(), api_key.clone(), request.clone()).boxed(),
            self.retry.clone(),
            "chat_completion",
            is_transient,
        )
        .await?;

        let text = response_text(response, &self.model)?;
        debug!(
            chars = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Chat completion finished"
        );
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
