//! Job-board data-integrity audit
//!
//! Connects to the job-board's PostgREST store (or an offline snapshot),
//! checks application-level invariants across six fixed categories, prints
//! one line per check as it runs and finishes with a conformance report.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Categories, outcomes, per-category and overall results
//! - **store**: Data-store collaborator (REST and in-memory backends)
//! - **audit**: Category auditors, test recorder and report finalizer
//! - **config**: Layered settings resolution
//! - **log_collector**: `log` backend with optional file persistence

// Core foundational modules
pub mod error;
pub mod models;

// Data-store collaborator
pub mod store;

// Category auditors and report
pub mod audit;

// Settings file, environment and CLI layering
pub mod config;

// stderr + file logging pipeline
pub mod log_collector;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::LogCollector;

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{AuditError, Result, StoreError};

pub use models::{
    AuditRun, Category, CategoryResult, OverallResult, TestOutcome, Verdict,
};

pub use store::{DataStore, MemoryStore, Query, RestStore};

pub use audit::{AuditContext, Auditor, Recorder};

pub use config::{AuditConfig, Credentials, Settings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
