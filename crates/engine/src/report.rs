use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{ErrorCategory, ErrorRecord, ReconResult};

/// What the export/UI collaborator consumes: one sheet per category plus a
/// summary. Pure transformation of a [`ReconResult`], no IO; rendering and
/// styling live entirely in the export layer.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: ReportSummary,
    /// Category → ordered findings. Every category appears, empty or not, so
    /// absence is explicit.
    pub sheets: BTreeMap<ErrorCategory, Vec<ErrorRecord>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub generated_at: String,
    pub config_name: String,
    pub total_records: usize,
    pub total_findings: usize,
    pub truncated: bool,
    pub counts: BTreeMap<ErrorCategory, usize>,
}

pub fn build_report(result: &ReconResult) -> Report {
    Report {
        summary: ReportSummary {
            generated_at: chrono::Utc::now().to_rfc3339(),
            config_name: result.meta.config_name.clone(),
            total_records: result.summary.total_records,
            total_findings: result.summary.total_findings,
            truncated: result.summary.truncated,
            counts: result.summary.category_counts.clone(),
        },
        sheets: result.errors.clone(),
    }
}
