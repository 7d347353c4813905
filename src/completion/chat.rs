use super::{parse_completion, Completer, CompletionRequest};
use crate::error::PolishError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: [ChatRequestMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Talks to an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
}

impl ChatCompletionClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("polish-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| anyhow::anyhow!("Failed to build HTTP client: {err}"))?;
        Ok(Self { client })
    }

    fn classify_transport(err: reqwest::Error) -> PolishError {
        if err.is_timeout() {
            PolishError::Timeout
        } else {
            PolishError::NetworkError(err.to_string())
        }
    }
}

#[async_trait]
impl Completer for ChatCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, PolishError> {
        let url = request.validate()?;

        let body = ChatRequestBody {
            model: &request.model,
            messages: [
                ChatRequestMessage {
                    role: "system",
                    content: &request.style_prompt,
                },
                ChatRequestMessage {
                    role: "user",
                    content: request.text.trim(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            endpoint = %url,
            model = %request.model,
            chars = request.text.chars().count(),
            "Sending completion request"
        );
        let started = Instant::now();

        let response = self
            .client
            .post(url)
            .bearer_auth(request.api_key.trim())
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::classify_transport)?;

        if !status.is_success() {
            let err = PolishError::upstream(status.as_u16(), &text);
            warn!(status = status.as_u16(), "Completion request rejected: {}", err);
            return Err(err);
        }

        let polished = parse_completion(&text)?;
        info!(
            "✨ Completion received in {} ms ({} chars)",
            started.elapsed().as_millis(),
            polished.chars().count()
        );
        Ok(polished)
    }
}
