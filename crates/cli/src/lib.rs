//! `monkai-trace` command-line front end: config checks, connectivity
//! test, session resolution, JSON file upload and queries.

pub mod cli;
