//! smart-mattress telemetry tooling.
//!
//! every entry point follows the same path: sign in, walk the paged backend,
//! flatten the nested records, then export them to files or serve them as
//! json. main.rs wires these modules into cli modes.

pub mod api;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error_codes;
pub mod export;
pub mod filter;
pub mod flatten;
pub mod literal;
pub mod paginate;
pub mod report;
pub mod server;
pub mod table;
pub mod timefmt;
