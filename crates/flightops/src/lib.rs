//! `flightops` - Flight-operations records with a tamper-evident audit trail
//!
//! Keeps the fleet registry, flight and telemetry logs, and maintenance logs
//! in `SQLite`. Maintenance logs raise and resolve threshold alerts, flights
//! derive their mission status, and every change appends to a hash-chained
//! ledger in the same transaction. [`ops::Operations`] is the write path;
//! [`Storage`] serves reads and [`dashboard::collect`] the live rollup.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod alerts;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod mission;
pub mod model;
pub mod notify;
pub mod ops;
pub mod storage;

pub use alerts::{AlertDecision, AlertOutcome};
pub use config::Config;
pub use dashboard::DashboardMetrics;
pub use error::{Error, Result, ValidationErrors};
pub use ledger::{ActionKind, AuditEntry, ChainReport, NewAuditEntry};
pub use logging::init_logging;
pub use notify::{BroadcastNotifier, Notification, Notifier};
pub use ops::{Caller, FlightOutcome, MaintenanceOutcome, Operations};
pub use storage::{Storage, StorageStats};
