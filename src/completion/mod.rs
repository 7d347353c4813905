mod chat;

use crate::error::PolishError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub use chat::ChatCompletionClient;

pub const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 600;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// One polish call: the style prompt goes out as the system message and the
/// captured text as the user message.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub text: String,
    pub style_prompt: String,
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl CompletionRequest {
    /// Checks everything that can be rejected without touching the network.
    pub fn validate(&self) -> Result<reqwest::Url, PolishError> {
        if self.text.trim().is_empty() {
            return Err(PolishError::EmptyInput);
        }
        if self.api_key.trim().is_empty() {
            return Err(PolishError::NotConfigured);
        }

        let url = reqwest::Url::parse(self.endpoint.trim())
            .map_err(|_| PolishError::InvalidEndpoint(self.endpoint.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PolishError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(url)
    }
}

#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, PolishError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extracts the trimmed content of the first choice from a 2xx body.
pub fn parse_completion(body: &str) -> Result<String, PolishError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|err| PolishError::Unknown(format!("Malformed completion response: {err}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(PolishError::EmptyUpstreamResult)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            text: "hello".to_string(),
            style_prompt: "be formal".to_string(),
            api_key: "sk-test".to_string(),
            endpoint: DEFAULT_API_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[test]
    fn empty_choices_is_empty_result() {
        assert_eq!(
            parse_completion(r#"{"choices": []}"#),
            Err(PolishError::EmptyUpstreamResult)
        );
        assert_eq!(
            parse_completion(r#"{"id": "x"}"#),
            Err(PolishError::EmptyUpstreamResult)
        );
    }

    #[test]
    fn blank_content_is_empty_result() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"   \n"}}]}"#;
        assert_eq!(parse_completion(body), Err(PolishError::EmptyUpstreamResult));
    }

    #[test]
    fn takes_first_choice_trimmed() {
        let body = r#"{"choices":[
            {"index":0,"message":{"role":"assistant","content":"  Dear team,\n"}},
            {"index":1,"message":{"role":"assistant","content":"ignored"}}
        ]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Dear team,");
    }

    #[test]
    fn validation_rejects_missing_key_and_bad_endpoint() {
        let mut missing_key = request();
        missing_key.api_key = "  ".to_string();
        assert_eq!(missing_key.validate(), Err(PolishError::NotConfigured));

        let mut bad_endpoint = request();
        bad_endpoint.endpoint = "not a url".to_string();
        assert!(matches!(
            bad_endpoint.validate(),
            Err(PolishError::InvalidEndpoint(_))
        ));

        let mut ftp = request();
        ftp.endpoint = "ftp://example.com/chat".to_string();
        assert!(matches!(ftp.validate(), Err(PolishError::InvalidEndpoint(_))));

        let mut blank = request();
        blank.text = " \t".to_string();
        assert_eq!(blank.validate(), Err(PolishError::EmptyInput));

        assert!(request().validate().is_ok());
    }
}
