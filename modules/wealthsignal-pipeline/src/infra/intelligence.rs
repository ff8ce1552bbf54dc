use ai_client::{strip_code_blocks, truncate_to_char_boundary, Claude, Message};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::traits::{IntelligenceRequest, IntelligenceService};

/// Claude-backed intelligence. Examples become alternating user/assistant
/// turns ahead of the real input, and the reply must parse as JSON.
pub struct ClaudeIntelligence {
    claude: Claude,
}

impl ClaudeIntelligence {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(api_key, model),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.claude = self.claude.with_base_url(url);
        self
    }

    pub fn model(&self) -> &str {
        self.claude.model()
    }
}

pub(crate) fn build_messages(request: &IntelligenceRequest) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2 + request.examples.len() * 2);
    messages.push(Message::system(&request.system));
    for (user, assistant) in &request.examples {
        messages.push(Message::user(user));
        messages.push(Message::assistant(assistant));
    }
    messages.push(Message::user(&request.user));
    messages
}

pub(crate) fn parse_reply(raw: &str) -> Result<Value> {
    let body = strip_code_blocks(raw);
    serde_json::from_str(body).with_context(|| {
        format!(
            "model reply was not JSON: {}",
            truncate_to_char_boundary(body, 200)
        )
    })
}

#[async_trait]
impl IntelligenceService for ClaudeIntelligence {
    async fn complete_json(&self, request: &IntelligenceRequest) -> Result<Value> {
        let messages = build_messages(request);
        debug!(task = ?request.task, examples = request.examples.len(), "Intelligence call");

        let raw = self
            .claude
            .chat(&messages)
            .await
            .with_context(|| format!("{:?} call failed", request.task))?;

        parse_reply(&raw).inspect_err(|e| {
            warn!(task = ?request.task, error = %e, "Unparseable intelligence reply");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::IntelligenceTask;
    use ai_client::MessageRole;

    #[test]
    fn examples_become_alternating_turns() {
        let request = IntelligenceRequest::new(IntelligenceTask::Salvage, "sys", "real input")
            .with_examples(&[("q1", "a1"), ("q2", "a2")]);
        let roles: Vec<MessageRole> = build_messages(&request).iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
            ]
        );
        assert_eq!(build_messages(&request).last().unwrap().content, "real input");
    }

    #[test]
    fn fenced_json_is_accepted() {
        let value = parse_reply("```json\n{\"ok\": true}\n```").unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn prose_is_rejected() {
        assert!(parse_reply("Sure! Here is the answer.").is_err());
    }
}
