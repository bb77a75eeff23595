//! Background janitor for workspace infrastructure.
//!
//! Follows container events to report abnormal stops and periodically
//! removes containers and networks the workspace API no longer knows about.

pub mod api_ledger;
pub mod config;
pub mod tracking;

pub use api_ledger::ApiLedger;
pub use config::JanitorConfig;
pub use tracking::{machine_name, track_running_containers};
