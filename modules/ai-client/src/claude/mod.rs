mod client;
pub(crate) mod types;

use crate::error::AiError;
use crate::traits::{Message, MessageRole};

use client::ClaudeClient;
use types::*;

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    max_tokens: u32,
    http: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            max_tokens: 4096,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key, self.http.clone());
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    /// Send a conversation and return the text of the reply.
    ///
    /// System messages are folded into the top-level `system` field; the
    /// remaining messages keep their order, so few-shot examples can be passed
    /// as alternating user/assistant turns ahead of the real input.
    pub async fn chat(&self, messages: &[Message]) -> Result<String, AiError> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let mut request = ChatRequest::new(&self.model)
            .max_tokens(self.max_tokens)
            .temperature(0.0);
        if !system.is_empty() {
            request = request.system(system.join("\n\n"));
        }
        for message in messages {
            match message.role {
                MessageRole::System => {}
                MessageRole::User => request = request.message(WireMessage::user(&message.content)),
                MessageRole::Assistant => {
                    request = request.message(WireMessage::assistant(&message.content))
                }
            }
        }

        let response = self.client().chat(&request).await?;
        response.text().ok_or(AiError::EmptyResponse("Claude"))
    }
}
