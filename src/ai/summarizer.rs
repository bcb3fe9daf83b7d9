use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::SummaryProvider;

const MAX_INPUT_CHARS: usize = 10_000;

const SYSTEM_PROMPT: &str = r#"You are a helpful assistant that summarizes encyclopedia articles.
Provide a concise, informative summary in 2-3 sentences.
Focus on the key facts a reader would want to remember.
Use clear, accessible language."#;

/// Everything the summarizer needs, handed over at construction time.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Summarizer backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiSummarizer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(config: SummarizerConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
            model: config.model,
        })
    }
}

/// Cuts `text` to at most `max_chars` characters without splitting one.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl SummaryProvider for OpenAiSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let content = truncate_chars(text, MAX_INPUT_CHARS);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: format!("Please summarize the following article:\n\n{content}"),
                },
            ],
            max_tokens: 256,
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::OpenAiApi(format!("HTTP {status}: {error_text}")));
        }

        let chat: ChatResponse = response.json().await?;

        chat.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|summary| summary.trim().to_string())
            .filter(|summary| !summary.is_empty())
            .ok_or_else(|| AppError::OpenAiApi("empty completion".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn summarizer_for(server: &MockServer) -> OpenAiSummarizer {
        OpenAiSummarizer::new(SummarizerConfig {
            api_key: "sk-test".to_string(),
            base_url: format!("{}/v1/", server.uri()),
            model: "gpt-test".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "choices": [
                    { "index": 0, "message": { "role": "assistant", "content": "  Paris is France's capital.\n" }, "finish_reason": "stop" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let summarizer = summarizer_for(&server);
        let summary = summarizer.summarize("Paris is the capital of France.").await.unwrap();

        assert_eq!(summary, "Paris is France's capital.");
        assert_eq!(summarizer.model(), "gpt-test");
    }

    #[tokio::test]
    async fn quota_error_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string("{\"error\":{\"code\":\"insufficient_quota\"}}"),
            )
            .mount(&server)
            .await;

        let result = summarizer_for(&server).summarize("text").await;
        assert!(matches!(
            result,
            Err(AppError::OpenAiApi(msg)) if msg.contains("insufficient_quota")
        ));
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let result = summarizer_for(&server).summarize("text").await;
        assert!(matches!(result, Err(AppError::OpenAiApi(_))));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
