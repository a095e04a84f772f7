//! Conversational assistant
//!
//! A [`Conversation`] keeps the ordered chat history and asks a pluggable
//! [`Responder`] for each reply. The built-in [`CatalogueResponder`] answers
//! from a snapshot of what the server advertises and never does I/O.

use crate::mcp::client::{ClientError, McpClient};
use crate::mcp::transport::Transport;
use crate::ops::api::ResourceKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

/// Produces the next assistant message from the history so far
#[allow(async_fn_in_trait)]
pub trait Responder {
    async fn respond(&self, history: &[ChatMessage]) -> String;
}

pub struct Conversation<R: Responder> {
    responder: R,
    messages: Vec<ChatMessage>,
}

impl<R: Responder> Conversation<R> {
    pub fn new(responder: R) -> Self {
        Self {
            responder,
            messages: Vec::new(),
        }
    }

    /// Start the history with a system message
    pub fn with_system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::new(ChatRole::System, content));
        self
    }

    /// Append the user's message and the responder's reply; returns the reply
    pub async fn send(&mut self, content: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage::new(ChatRole::User, content));
        let reply = self.responder.respond(&self.messages).await;
        tracing::debug!("Assistant replied with {} characters", reply.len());
        self.messages.push(ChatMessage::new(ChatRole::Assistant, reply));
        &self.messages[self.messages.len() - 1]
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.retain(|m| m.role == ChatRole::System);
    }
}

/// Answers from the server's advertised tools, resources and prompts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogueResponder {
    pub server_name: String,
    pub tools: Vec<String>,
    pub resources: Vec<String>,
    pub prompts: Vec<String>,
}

impl CatalogueResponder {
    /// Snapshot the catalogue of a connected client
    pub async fn from_client<T: Transport>(client: &mut McpClient<T>) -> Result<Self, ClientError> {
        let server_name = client
            .server_capabilities()
            .map(|caps| caps.server_info.name.clone())
            .unwrap_or_default();
        let tools = client.list_tools().await?.into_iter().map(|t| t.name).collect();
        let resources = client
            .list_resources()
            .await?
            .into_iter()
            .map(|r| r.uri)
            .collect();
        let prompts = client
            .list_prompts()
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();

        Ok(Self {
            server_name,
            tools,
            resources,
            prompts,
        })
    }

    fn help(&self) -> String {
        let name = if self.server_name.is_empty() {
            "the server"
        } else {
            self.server_name.as_str()
        };
        format!(
            "I can tell you what {name} offers: {} tools, {} resources and {} prompts. \
             Ask about \"tools\", \"resources\", \"prompts\", or a resource such as \"tenants\".",
            self.tools.len(),
            self.resources.len(),
            self.prompts.len()
        )
    }

    fn listing(label: &str, items: &[String]) -> String {
        if items.is_empty() {
            format!("The server advertises no {label}.")
        } else {
            format!("Available {label}: {}.", items.join(", "))
        }
    }
}

impl Responder for CatalogueResponder {
    async fn respond(&self, history: &[ChatMessage]) -> String {
        let Some(question) = history.iter().rev().find(|m| m.role == ChatRole::User) else {
            return self.help();
        };
        let question = question.content.to_ascii_lowercase();

        if question.trim().is_empty() || question.contains("help") {
            return self.help();
        }
        if question.contains("tool") {
            return Self::listing("tools", &self.tools);
        }
        if question.contains("prompt") {
            return Self::listing("prompts", &self.prompts);
        }
        if question.contains("resource") {
            return Self::listing("resources", &self.resources);
        }

        let asked = question
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find_map(|word| word.parse::<ResourceKind>().ok());
        if let Some(kind) = asked {
            let uri = kind.list_uri();
            return if self.resources.contains(&uri) {
                format!("{kind} records are listed at {uri}.")
            } else {
                format!("The server does not advertise {uri}.")
            };
        }

        "I can't answer that yet. Type \"help\" to see what I know about.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responder() -> CatalogueResponder {
        CatalogueResponder {
            server_name: "OpsCenterMCP".to_string(),
            tools: vec!["compute_health".to_string()],
            resources: vec!["ops://tenant/list".to_string()],
            prompts: vec!["prompt_task_summary".to_string()],
        }
    }

    #[tokio::test]
    async fn test_conversation_records_both_sides() {
        let mut conversation = Conversation::new(responder()).with_system("You are the ops assistant");

        let reply = conversation.send("help").await.content.clone();
        assert!(reply.contains("OpsCenterMCP"));

        let roles: Vec<ChatRole> = conversation.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::System, ChatRole::User, ChatRole::Assistant]);

        conversation.clear();
        assert_eq!(conversation.history().len(), 1);
    }

    #[tokio::test]
    async fn test_catalogue_answers() {
        let mut conversation = Conversation::new(responder());

        assert!(conversation
            .send("Which tools do you have?")
            .await
            .content
            .contains("compute_health"));
        assert!(conversation
            .send("show me tenants")
            .await
            .content
            .contains("ops://tenant/list"));
        assert!(conversation
            .send("what about agents?")
            .await
            .content
            .contains("does not advertise ops://agent/list"));
        assert!(conversation
            .send("what's the weather")
            .await
            .content
            .contains("help"));
    }

    #[tokio::test]
    async fn test_empty_catalogue() {
        let reply = CatalogueResponder::default()
            .respond(&[ChatMessage::new(ChatRole::User, "prompts?")])
            .await;
        assert_eq!(reply, "The server advertises no prompts.");
    }
}
