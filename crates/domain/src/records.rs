//! Records uploaded to the ingestion API.
//!
//! Field names are `snake_case` on the wire.  Optional fields are omitted
//! when unset so that the server applies its own defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// One entry of a conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_internal_tool: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_tool_type: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            sender: None,
            tool_name: None,
            tool_calls: None,
            is_internal_tool: None,
            internal_tool_type: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content).with_sender("user")
    }

    pub fn assistant(content: impl Into<String>, agent: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content).with_sender(agent)
    }

    pub fn tool(content: impl Into<String>, agent: impl Into<String>, tool: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content).with_sender(agent);
        msg.tool_name = Some(tool.into());
        msg
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_tool_call(mut self, call: serde_json::Value) -> Self {
        self.tool_calls.get_or_insert_with(Vec::new).push(call);
        self
    }
}

/// A handoff from one agent to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_agent: String,
    pub to_agent: String,
    pub timestamp: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token accounting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Raw usage counters as reported by the model provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Token usage split into the four segments the dashboard reports on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// System prompt / instructions.
    pub process_tokens: u64,
    /// Conversation context carried into the call.
    pub memory_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64, process_tokens: u64, memory_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            process_tokens,
            memory_tokens,
            total_tokens: input_tokens + output_tokens + process_tokens + memory_tokens,
        }
    }

    /// Combine provider-reported usage with locally estimated segments.
    pub fn from_model_usage(usage: ModelUsage, system_prompt_tokens: u64, context_tokens: u64) -> Self {
        Self::new(
            usage.input_tokens,
            usage.output_tokens,
            system_prompt_tokens,
            context_tokens,
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A finalized conversation turn, ready for upload via `/records/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub namespace: String,
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub msg: Vec<Message>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub process_tokens: u64,
    #[serde(default)]
    pub memory_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfers: Option<Vec<Transfer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_at: Option<String>,
    /// End-user identifier (e.g. a phone number for WhatsApp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_name: Option<String>,
    /// Channel of origin (`whatsapp`, `teams`, `web`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_channel: Option<String>,
    /// Additional fields passed through verbatim.
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ConversationRecord {
    pub fn new(namespace: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            agent: agent.into(),
            session_id: None,
            msg: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
            process_tokens: 0,
            memory_tokens: 0,
            total_tokens: 0,
            transfers: None,
            inserted_at: None,
            external_user_id: None,
            external_user_name: None,
            external_user_channel: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.input_tokens = usage.input_tokens;
        self.output_tokens = usage.output_tokens;
        self.process_tokens = usage.process_tokens;
        self.memory_tokens = usage.memory_tokens;
        self.total_tokens = usage.total_tokens;
        self
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage::new(
            self.input_tokens,
            self.output_tokens,
            self.process_tokens,
            self.memory_tokens,
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Log entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Levels accepted by `/logs/upload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" | "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "critical" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// A single log line, ready for upload via `/logs/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub namespace: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// ISO-8601 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_object: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl LogEntry {
    pub fn new(namespace: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            level,
            message: message.into(),
            resource_id: None,
            timestamp: None,
            custom_object: None,
            metadata: None,
        }
    }
}
