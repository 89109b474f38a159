//! §4.6 LLM enhancement stage: one `ChatProvider` trait, Azure and OpenAI behind it.

use async_trait::async_trait;
use justwhisper_core::ChatProviderConfig;
use serde::Deserialize;
use serde_json::json;

use crate::request::{Body, HttpRequest};
use crate::runtime::execute;

#[derive(Debug, thiserror::Error)]
pub enum ChatClientError {
    #[error("provider is missing a required credential")]
    MissingCredential,

    #[error("http error {status}: {body_excerpt}")]
    Http { status: u16, body_excerpt: String },

    #[error("request failed: {0}")]
    Io(String),

    #[error("failed to parse chat completion response: {0}")]
    ResponseParse(String),
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, ChatClientError>;
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn build_chat_request(url: String, auth_header: (String, String), model: &str, system_prompt: &str, user_message: &str) -> HttpRequest {
    let payload = json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": user_message},
        ],
        "temperature": 0.3,
        "max_tokens": 1000,
    });

    HttpRequest {
        method: "POST".into(),
        url,
        headers: vec![("Content-Type".into(), "application/json".into()), auth_header],
        body: Body::Json(payload.to_string()),
    }
}

async fn send_and_parse(req: HttpRequest) -> Result<String, ChatClientError> {
    let resp = execute(&req).await.map_err(|e| ChatClientError::Io(e.to_string()))?;
    if resp.status >= 400 {
        let excerpt: String = String::from_utf8_lossy(&resp.body).chars().take(300).collect();
        return Err(ChatClientError::Http { status: resp.status, body_excerpt: excerpt });
    }
    parse_chat_completion(&resp.body)
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn parse_chat_completion(body: &[u8]) -> Result<String, ChatClientError> {
    let resp: ChatCompletionResponse =
        serde_json::from_slice(body).map_err(|e| ChatClientError::ResponseParse(e.to_string()))?;
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ChatClientError::ResponseParse("no content in chat completion response".into()))
}

pub struct AzureChatProvider {
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
}

#[async_trait]
impl ChatProvider for AzureChatProvider {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, ChatClientError> {
        let endpoint = self.endpoint.trim_end_matches('/');
        let url = format!(
            "{endpoint}/openai/deployments/{}/chat/completions?api-version={}",
            self.deployment, self.api_version
        );
        let req = build_chat_request(
            url,
            ("api-key".into(), self.api_key.clone()),
            &self.deployment,
            system_prompt,
            user_message,
        );
        send_and_parse(req).await
    }
}

pub struct OpenAiChatProvider {
    api_key: String,
    model: String,
    base_url: String,
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, ChatClientError> {
        let url = join_url(&self.base_url, "/chat/completions");
        let req = build_chat_request(
            url,
            ("Authorization".into(), format!("Bearer {}", self.api_key)),
            &self.model,
            system_prompt,
            user_message,
        );
        send_and_parse(req).await
    }
}

/// §9 Open Question resolution: dispatch on the active `ChatProviderConfig` variant, one
/// `ChatProvider` per provider family.
pub fn build_chat_provider(config: &ChatProviderConfig) -> Result<Box<dyn ChatProvider>, ChatClientError> {
    if !config.is_usable() {
        return Err(ChatClientError::MissingCredential);
    }
    Ok(match config.clone() {
        ChatProviderConfig::AzureChat { api_key, endpoint, deployment, api_version } => {
            Box::new(AzureChatProvider { api_key, endpoint, deployment, api_version })
        }
        ChatProviderConfig::OpenAiChat { api_key, model, base_url } => {
            Box::new(OpenAiChatProvider { api_key, model, base_url })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_trailing_slash() {
        assert_eq!(join_url("https://api.example.com/", "/chat/completions"), "https://api.example.com/chat/completions");
        assert_eq!(join_url("https://api.example.com", "chat/completions"), "https://api.example.com/chat/completions");
    }

    #[test]
    fn parses_chat_completion_content() {
        let body = br#"{"choices":[{"message":{"content":"hi"}}]}"#;
        assert_eq!(parse_chat_completion(body).unwrap(), "hi");
    }

    #[test]
    fn missing_content_errors() {
        let body = br#"{"choices":[{"message":{}}]}"#;
        assert!(parse_chat_completion(body).is_err());
    }

    #[test]
    fn unusable_config_is_rejected_before_building_a_client() {
        let config = ChatProviderConfig::OpenAiChat {
            api_key: "".into(),
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
        };
        assert!(build_chat_provider(&config).is_err());
    }
}
