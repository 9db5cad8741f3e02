//! `ivyrecon-engine`: benefits-enrollment reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded rows per source, returns categorized
//! findings. No CLI or IO dependencies beyond CSV row loading. Nothing is
//! persisted; every run operates on its own records and its own result.

pub mod alias;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod report;

pub use alias::{AliasTable, Resolution};
pub use config::ReconConfig;
pub use engine::{reconcile, run, run_with_deadline};
pub use error::ReconError;
pub use model::{EnrollmentRecord, ErrorCategory, ErrorRecord, ReconInput, ReconResult, Source};
pub use report::{build_report, Report};
