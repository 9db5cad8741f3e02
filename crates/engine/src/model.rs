use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The three record categories a run can reconcile. Declaration order is the
/// deterministic source order used for grouping and output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Payroll,
    Carrier,
    BenAdmin,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Payroll, Source::Carrier, Source::BenAdmin];
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payroll => write!(f, "payroll"),
            Self::Carrier => write!(f, "carrier"),
            Self::BenAdmin => write!(f, "ben_admin"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One raw uploaded row: arbitrary header string → stringified cell value.
pub type RawRow = HashMap<String, String>;

/// Pre-loaded raw rows grouped by source. Built fresh per invocation.
pub struct ReconInput {
    pub rows: BTreeMap<Source, Vec<RawRow>>,
}

/// A single row from one source after normalization. Immutable thereafter
/// except `plan_name_canonical`, which the alias resolver fills in.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentRecord {
    pub source: Source,
    /// 1-based position in the source's upload, for report detail.
    pub row_index: usize,
    /// Digits-only canonical form.
    pub ssn: String,
    pub first_name: String,
    pub last_name: String,
    pub plan_name_raw: String,
    pub plan_name_canonical: String,
    pub employee_cost_cents: i64,
    pub employer_cost_cents: i64,
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// All records across sources sharing one SSN, partitioned by source.
#[derive(Debug, Clone)]
pub struct MatchGroup {
    pub ssn: String,
    pub by_source: BTreeMap<Source, Vec<EnrollmentRecord>>,
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Fixed classification for every reconciliation finding. Declaration order
/// is the output order of report sheets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    MalformedSsn,
    InvalidCost,
    DuplicateWithinSource,
    DuplicateSsnDifferentPlan,
    MissingInSource,
    CostMismatch,
    UnresolvedPlanName,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::MalformedSsn,
        ErrorCategory::InvalidCost,
        ErrorCategory::DuplicateWithinSource,
        ErrorCategory::DuplicateSsnDifferentPlan,
        ErrorCategory::MissingInSource,
        ErrorCategory::CostMismatch,
        ErrorCategory::UnresolvedPlanName,
    ];
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedSsn => write!(f, "malformed_ssn"),
            Self::InvalidCost => write!(f, "invalid_cost"),
            Self::DuplicateWithinSource => write!(f, "duplicate_within_source"),
            Self::DuplicateSsnDifferentPlan => write!(f, "duplicate_ssn_different_plan"),
            Self::MissingInSource => write!(f, "missing_in_source"),
            Self::CostMismatch => write!(f, "cost_mismatch"),
            Self::UnresolvedPlanName => write!(f, "unresolved_plan_name"),
        }
    }
}

/// One categorized finding. Created by the engine, consumed read-only by the
/// report builder.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    pub ssn: String,
    pub detail: String,
    pub source_records: Vec<EnrollmentRecord>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    /// Input rows across all sources, including rows excluded as row-level
    /// errors.
    pub total_records: usize,
    /// Sum of emitted findings across categories.
    pub total_findings: usize,
    /// Count per category. Every category is present, zero counts included.
    pub category_counts: BTreeMap<ErrorCategory, usize>,
    /// True when a deadline cut the run short; the result covers completed
    /// groups only.
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

/// The engine's complete output. Owned solely by the invocation that
/// produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    /// Category → findings, ordered by ascending SSN within each category.
    pub errors: BTreeMap<ErrorCategory, Vec<ErrorRecord>>,
}
