//! `mt-hooks`: agent-run instrumentation for monkai-trace.
//!
//! An agent framework adapter forwards its lifecycle callbacks to a
//! [`RunTracker`], which builds one [`ConversationRecord`] per run and hands
//! it to a [`TelemetryBatcher`].  [`IngestLogLayer`] forwards application
//! `tracing` events as log entries through a second batcher.
//! [`Telemetry`] wires all of it from a config file.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mt_domain::config::Config;
//! use mt_hooks::{AgentInfo, AgentOutput, RunContext, Telemetry};
//!
//! # async fn example() -> mt_domain::error::Result<()> {
//! let telemetry = Telemetry::start(Config::from_path("monkai.toml".as_ref())?, None).await?;
//! let mut tracker = telemetry.tracker()?;
//!
//! let ctx = RunContext::for_user("user-42");
//! let agent = AgentInfo::new("triage");
//! tracker.set_user_input("where is my order?");
//! tracker.on_agent_start(&ctx, &agent).await;
//! tracker.on_agent_end(&ctx, &agent, &AgentOutput::text("It ships today.")).await;
//!
//! telemetry.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! [`ConversationRecord`]: mt_domain::records::ConversationRecord

pub mod batcher;
pub mod context;
pub mod extract;
pub mod internal_tools;
pub mod log_layer;
pub mod telemetry;
pub mod tracker;

pub use batcher::{spawn_interval_flush, FlushOutcome, TelemetryBatcher};
pub use context::{AgentInfo, AgentOutput, ChatMessage, LlmInput, RunContext};
pub use extract::{default_strategies, extract_user_message, ExtractionInput, UserMessageStrategy};
pub use log_layer::{spawn_drain, IngestLogLayer};
pub use telemetry::{ShutdownReport, Telemetry};
pub use tracker::{PendingRecord, RunTracker, TrackerOptions};
