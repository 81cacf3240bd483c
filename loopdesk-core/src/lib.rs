//! # loopdesk-core
//!
//! Core library for loopdesk - an IT-support incident grouping and
//! notification engine.
//!
//! This library provides:
//! - Domain types for incidents, groups, and history
//! - SQLite storage with an idempotent notification ledger
//! - The grouping engine (ordered matching cascade)
//! - The notification poller and delivery reconciler
//! - Knowledge-base learning from resolutions
//!
//! ## Architecture
//!
//! Two independent halves share the store:
//! - **Intake:** reports run through the classifier and the grouping
//!   cascade and land as incident records, clustered by `group_id`
//! - **Outbound:** a poller scans for undelivered notifiable incidents,
//!   the reconciler walks delivery channels most-specific first, and a
//!   durable ack stops repeats (at-least-once end to end)
//!
//! ## Example
//!
//! ```rust,no_run
//! use loopdesk_core::{Config, Database};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use grouping::{GroupOutcome, GroupingEngine};
pub use notify::{DeliveryReconciler, NotificationPoller};
pub use triage::{BatchFilter, SubmitOutcome, TriageService};
pub use types::*;

// Public modules
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod grouping;
pub mod kb;
pub mod logging;
pub mod notify;
pub mod similarity;
pub mod triage;
pub mod types;
