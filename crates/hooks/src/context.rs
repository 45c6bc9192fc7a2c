//! Typed views of what an agent framework hands to its run hooks.

use serde::{Deserialize, Serialize};

use mt_domain::records::ModelUsage;

/// One message of a framework-side conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

/// Context object passed to every hook of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    /// End-user identity supplied by the host.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Host-defined inner context.
    #[serde(default)]
    pub context: Option<Box<RunContext>>,
    /// Token usage reported by the model provider.
    #[serde(default)]
    pub usage: Option<ModelUsage>,
    /// Raw items of the last model response.
    #[serde(default)]
    pub response_items: Vec<serde_json::Value>,
}

impl RunContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Content of the first user message in `messages`.
    pub fn first_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.is_user())
            .map(|m| m.content.as_str())
    }
}

/// The agent a hook refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl AgentInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// Input handed to the model right before a call.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmInput {
    Text(String),
    Items(Vec<ChatMessage>),
    Other(serde_json::Value),
}

impl LlmInput {
    /// The user's message, if the input carries one.
    pub fn user_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Items(items) => items.iter().find(|m| m.is_user()).map(|m| m.content.clone()),
            Self::Other(serde_json::Value::Null) => None,
            Self::Other(v) => Some(v.to_string()),
        }
        .filter(|s| !s.trim().is_empty())
    }
}

/// Final output of an agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutput {
    pub text: String,
    /// Raw response items, where built-in tool calls show up.
    pub raw_items: Vec<serde_json::Value>,
}

impl AgentOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raw_items: Vec::new(),
        }
    }
}
