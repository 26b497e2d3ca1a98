#![forbid(unsafe_code)]

//! Core domain model and business logic for the rangelog shooting-range
//! logging system.
//!
//! This crate provides:
//! - Domain types (firearms, ammunition, sessions, maintenance, users)
//! - Caliber compatibility matching
//! - Derived session metrics (cost, accuracy, final score)
//! - The session ledger with ammunition stock reconciliation
//! - Maintenance interval reconstruction and status
//! - The rank engine
//! - Persistence (JSON document store with optimistic concurrency)

pub mod types;
pub mod error;
pub mod caliber;
pub mod metrics;
pub mod config;
pub mod logging;
pub mod store;
pub mod ledger;
pub mod maintenance;
pub mod rank;
pub mod summary;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use caliber::{CaliberMatcher, PermissiveCalibers, StrictCalibers};
pub use config::{CaliberPolicy, Config};
pub use store::{Database, JsonStore, MemoryStore, RecordStore};
pub use ledger::{PostCommitHook, SessionLedger, SessionOutcome};
pub use maintenance::{MaintenanceService, MaintenanceStatus, MaintenanceStatusReport};
pub use rank::{RankInfo, RankService};
pub use summary::{monthly_summary, MonthSummary};
pub use export::export_sessions;
