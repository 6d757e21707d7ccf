//! `quakemesh`: crowd-sourced seismic event detection.
//!
//! The crate ships two binaries built from this library:
//! - the ingestion/correlation server (`src/main.rs`), which accepts
//!   acceleration readings from many untrusted devices, correlates them over a
//!   trailing time window, and drives the global SAFE/CRITICAL alert state;
//! - the edge reporting client (`src/bin/reporter.rs`), which turns raw motion
//!   samples into threshold-gated, rate-limited submissions and polls the
//!   alert state.

pub mod alert;
pub mod config;
pub mod edge;
pub mod models;
pub mod routes;
pub mod schema;

pub use config::Config;
pub use models::{AlertStatus, EventDetail, ReportOutcome, ReportSubmission, StatusResponse};
