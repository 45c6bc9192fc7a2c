//! Shared types for monkai-trace: the error enum, configuration, record
//! models uploaded to the ingestion API, and structured trace events.

pub mod config;
pub mod error;
pub mod records;
pub mod trace;
