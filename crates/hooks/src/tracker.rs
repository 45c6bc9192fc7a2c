//! Framework-agnostic run tracker.
//!
//! An adapter forwards its framework's lifecycle callbacks here.  Events of
//! one run accumulate into a [`PendingRecord`]; at agent end the record is
//! finalized and handed to the batcher.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use mt_domain::config::{validate_namespace, ANONYMOUS_USER};
use mt_domain::error::Result;
use mt_domain::records::{ConversationRecord, Message, ModelUsage, Role, TokenUsage, Transfer};
use mt_domain::trace::TraceEvent;
use mt_sessions::SessionSource;

use crate::batcher::TelemetryBatcher;
use crate::context::{AgentInfo, AgentOutput, LlmInput, RunContext};
use crate::extract::{default_strategies, extract_user_message, ExtractionInput, UserMessageStrategy};
use crate::internal_tools;

/// Roughly four characters per token.
const CHARS_PER_TOKEN: usize = 4;

/// Tracker behaviour switches.
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub namespace: String,
    /// Enqueue finalized records into the batcher.
    pub auto_upload: bool,
    /// Count the agent instructions as process tokens.
    pub estimate_system_tokens: bool,
}

impl TrackerOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            auto_upload: true,
            estimate_system_tokens: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pending record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The in-progress conversation turn of one run.
#[derive(Debug, Clone, Default)]
pub struct PendingRecord {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub messages: Vec<Message>,
    pub transfers: Vec<Transfer>,
    pub system_prompt_tokens: u64,
    /// User input seen by any hook, kept to backfill the user message.
    pub user_input: Option<String>,
}

impl PendingRecord {
    fn has_role(&self, role: Role) -> bool {
        self.messages.iter().any(|m| m.role == role)
    }

    /// Turn the accumulated state into an immutable record.
    ///
    /// Guarantees a user message (when any input was seen) at the front and
    /// an assistant message carrying the final output.
    pub fn finalize(
        mut self,
        namespace: &str,
        agent: &str,
        output_text: &str,
        usage: Option<ModelUsage>,
    ) -> ConversationRecord {
        if !self.has_role(Role::User) {
            if let Some(input) = self.user_input.take() {
                self.messages.insert(0, Message::user(input));
            }
        }
        if !self.has_role(Role::Assistant) {
            self.messages.push(Message::assistant(output_text, agent));
        }

        let tokens = TokenUsage::from_model_usage(
            usage.unwrap_or_default(),
            self.system_prompt_tokens,
            0,
        );

        let mut record = ConversationRecord::new(namespace, agent).with_usage(tokens);
        record.session_id = self.session_id;
        record.msg = self.messages;
        record.transfers = (!self.transfers.is_empty()).then_some(self.transfers);
        record.inserted_at = Some(Utc::now().to_rfc3339());
        record.external_user_id = self.user_id.filter(|u| u != ANONYMOUS_USER);
        record
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run tracker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Turns run lifecycle callbacks into conversation records.
///
/// One tracker drives one run at a time; share the session source and the
/// batcher across trackers, not the tracker itself.
pub struct RunTracker {
    options: TrackerOptions,
    sessions: Arc<dyn SessionSource>,
    batcher: Arc<TelemetryBatcher<ConversationRecord>>,
    strategies: Vec<Box<dyn UserMessageStrategy>>,
    /// Identity registered ahead of the run.
    user_id: Option<String>,
    /// Input registered ahead of the run.
    pending_input: Option<String>,
    pending: PendingRecord,
}

impl std::fmt::Debug for RunTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunTracker")
            .field("options", &self.options)
            .field("user_id", &self.user_id)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl RunTracker {
    /// Fails on a malformed namespace.
    pub fn new(
        options: TrackerOptions,
        sessions: Arc<dyn SessionSource>,
        batcher: Arc<TelemetryBatcher<ConversationRecord>>,
    ) -> Result<Self> {
        validate_namespace(&options.namespace)?;
        Ok(Self {
            options,
            sessions,
            batcher,
            strategies: default_strategies(),
            user_id: None,
            pending_input: None,
            pending: PendingRecord::default(),
        })
    }

    /// Replace the user-message extraction order.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn UserMessageStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.options.namespace
    }

    /// The run in progress.
    pub fn pending(&self) -> &PendingRecord {
        &self.pending
    }

    /// Register the end-user identity for the next run.  A `user_id` on the
    /// run context takes precedence.
    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        self.user_id = Some(user_id.into());
    }

    /// Register the user's message for the next run.  Consumed by the next
    /// `on_agent_start`.
    pub fn set_user_input(&mut self, input: impl Into<String>) {
        self.pending_input = Some(input.into());
    }

    fn effective_user(&self, ctx: &RunContext) -> String {
        ctx.user_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .or(self.user_id.as_deref())
            .unwrap_or(ANONYMOUS_USER)
            .to_owned()
    }

    pub async fn on_agent_start(&mut self, ctx: &RunContext, agent: &AgentInfo) {
        if self.options.estimate_system_tokens {
            if let Some(instructions) = agent.instructions.as_deref() {
                self.pending.system_prompt_tokens = (instructions.len() / CHARS_PER_TOKEN) as u64;
            }
        }

        let user_id = self.effective_user(ctx);
        let session_id = self
            .sessions
            .resolve_or_create(&user_id, &self.options.namespace, false)
            .await;
        tracing::debug!(agent = %agent.name, %user_id, %session_id, "agent started");
        self.pending.session_id = Some(session_id);
        self.pending.user_id = Some(user_id);

        let pending_input = self.pending_input.take();
        let found = extract_user_message(
            &self.strategies,
            &ExtractionInput {
                pending: pending_input.as_deref(),
                context: ctx,
            },
        );
        match found {
            Some((source, content)) => {
                tracing::debug!(source, "captured user message");
                self.pending.user_input = Some(content.clone());
                self.pending.messages.push(Message::user(content));
            }
            None => tracing::warn!(
                agent = %agent.name,
                "no user message captured; register it with set_user_input"
            ),
        }
    }

    /// Capture the user message from the model input when no earlier hook
    /// found one.
    pub async fn on_llm_start(&mut self, _ctx: &RunContext, _agent: &AgentInfo, input: &LlmInput) {
        if self.pending.user_input.is_some() {
            return;
        }
        let Some(text) = input.user_text() else {
            return;
        };
        self.pending.user_input = Some(text.clone());
        if !self.pending.has_role(Role::User) {
            self.pending.messages.push(Message::user(text));
        }
    }

    pub async fn on_tool_start(&mut self, _ctx: &RunContext, agent: &AgentInfo, tool: &str) {
        self.pending
            .messages
            .push(Message::tool(format!("Calling tool: {tool}"), &agent.name, tool));
    }

    pub async fn on_tool_end(&mut self, _ctx: &RunContext, agent: &AgentInfo, tool: &str, result: &str) {
        self.pending
            .messages
            .push(Message::tool(result, &agent.name, tool));
    }

    /// Record the handoff and a `transfer_to_agent` tool message.
    pub async fn on_handoff(&mut self, _ctx: &RunContext, from: &AgentInfo, to: &AgentInfo) {
        let timestamp = Utc::now().to_rfc3339();
        tracing::debug!(from = %from.name, to = %to.name, "handoff");

        self.pending.transfers.push(Transfer {
            from_agent: from.name.clone(),
            to_agent: to.name.clone(),
            timestamp: timestamp.clone(),
        });
        self.pending.messages.push(
            Message::tool(
                format!("Transferring conversation to {}", to.name),
                &from.name,
                "transfer_to_agent",
            )
            .with_tool_call(json!({
                "name": "transfer_to_agent",
                "arguments": {
                    "from_agent": from.name,
                    "to_agent": to.name,
                    "timestamp": timestamp,
                }
            })),
        );
    }

    /// Finalize the run, enqueue the record when `auto_upload` is on, and
    /// reset for the next run.  Returns the finalized record.
    pub async fn on_agent_end(
        &mut self,
        ctx: &RunContext,
        agent: &AgentInfo,
        output: &AgentOutput,
    ) -> ConversationRecord {
        let raw_items = if output.raw_items.is_empty() {
            &ctx.response_items
        } else {
            &output.raw_items
        };
        let internal = internal_tools::capture(raw_items, &agent.name);
        if !internal.is_empty() {
            tracing::debug!(count = internal.len(), "captured built-in tool calls");
            self.pending.messages.extend(internal);
        }

        if ctx.usage.is_none() {
            tracing::debug!(agent = %agent.name, "no usage reported; token counts are estimates");
        }

        let pending = std::mem::take(&mut self.pending);
        let record = pending.finalize(&self.options.namespace, &agent.name, &output.text, ctx.usage);

        TraceEvent::RecordFinalized {
            agent: record.agent.clone(),
            session_id: record.session_id.clone(),
            messages: record.msg.len(),
            total_tokens: record.total_tokens,
        }
        .emit();

        if self.options.auto_upload {
            self.batcher.enqueue(record.clone()).await;
        }
        record
    }
}
