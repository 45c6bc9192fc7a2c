//! Locating the user's message for a run.
//!
//! Frameworks expose the user input in different places.  Strategies are
//! tried in order and the first one yielding non-blank content wins.

use crate::context::RunContext;

/// Everything a strategy may look at.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    /// Input registered through `RunTracker::set_user_input`.
    pub pending: Option<&'a str>,
    pub context: &'a RunContext,
}

pub trait UserMessageStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, input: &ExtractionInput<'_>) -> Option<String>;
}

fn non_blank(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

/// Input registered ahead of the run.
pub struct PendingInput;

impl UserMessageStrategy for PendingInput {
    fn name(&self) -> &'static str {
        "pending_input"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Option<String> {
        input.pending.and_then(non_blank)
    }
}

/// `context.input`.
pub struct ContextInput;

impl UserMessageStrategy for ContextInput {
    fn name(&self) -> &'static str {
        "context_input"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Option<String> {
        input.context.input.as_deref().and_then(non_blank)
    }
}

/// First user message in `context.messages`.
pub struct ContextMessages;

impl UserMessageStrategy for ContextMessages {
    fn name(&self) -> &'static str {
        "context_messages"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Option<String> {
        input.context.first_user_message().and_then(non_blank)
    }
}

/// The host's inner context: its input, then its first user message.
pub struct NestedContext;

impl UserMessageStrategy for NestedContext {
    fn name(&self) -> &'static str {
        "nested_context"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Option<String> {
        let nested = input.context.context.as_deref()?;
        nested
            .input
            .as_deref()
            .and_then(non_blank)
            .or_else(|| nested.first_user_message().and_then(non_blank))
    }
}

/// The built-in strategies in priority order.
pub fn default_strategies() -> Vec<Box<dyn UserMessageStrategy>> {
    vec![
        Box::new(PendingInput),
        Box::new(ContextInput),
        Box::new(ContextMessages),
        Box::new(NestedContext),
    ]
}

/// Run `strategies` in order; returns the winning strategy's name and the
/// content it found.
pub fn extract_user_message(
    strategies: &[Box<dyn UserMessageStrategy>],
    input: &ExtractionInput<'_>,
) -> Option<(&'static str, String)> {
    strategies
        .iter()
        .find_map(|s| s.extract(input).map(|content| (s.name(), content)))
}
