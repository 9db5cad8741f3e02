use std::collections::HashMap;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{EnrollmentRecord, ErrorCategory, ErrorRecord, RawRow, Source};

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

pub const COL_SSN: &str = "SSN";
pub const COL_FIRST_NAME: &str = "First Name";
pub const COL_LAST_NAME: &str = "Last Name";
pub const COL_PLAN_NAME: &str = "Plan Name";
pub const COL_EMPLOYEE_COST: &str = "Employee Cost";
pub const COL_EMPLOYER_COST: &str = "Employer Cost";

pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_SSN,
    COL_FIRST_NAME,
    COL_LAST_NAME,
    COL_PLAN_NAME,
    COL_EMPLOYEE_COST,
    COL_EMPLOYER_COST,
];

/// Map one raw header to its canonical column name. Case-insensitive,
/// whitespace-collapsing, with the accepted synonym spellings.
fn canonical_header(raw: &str) -> Option<&'static str> {
    let key = collapse_whitespace(&raw.trim().to_lowercase());
    match key.as_str() {
        "ssn" | "social security number" => Some(COL_SSN),
        "first name" => Some(COL_FIRST_NAME),
        "last name" => Some(COL_LAST_NAME),
        "plan" | "plan name" => Some(COL_PLAN_NAME),
        "employee cost" | "employee amount" => Some(COL_EMPLOYEE_COST),
        "employer cost" | "employer amount" => Some(COL_EMPLOYER_COST),
        _ => None,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve raw headers to canonical columns. Fails for the entire source when
/// any required column is absent; the first missing column (in canonical
/// order) is reported.
fn resolve_headers(
    headers: impl Iterator<Item = impl AsRef<str>>,
    source: Source,
) -> Result<HashMap<&'static str, String>, ReconError> {
    let mut resolved: HashMap<&'static str, String> = HashMap::new();
    for raw in headers {
        if let Some(canonical) = canonical_header(raw.as_ref()) {
            // First raw header claiming a canonical column wins.
            resolved
                .entry(canonical)
                .or_insert_with(|| raw.as_ref().to_string());
        }
    }
    for column in REQUIRED_COLUMNS {
        if !resolved.contains_key(column) {
            return Err(ReconError::MissingColumn { source, column });
        }
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Normalize one source's raw rows into enrollment records plus row-level
/// findings. Rows with a malformed SSN or unparseable cost are excluded from
/// the comparison set and surfaced in their own category instead. A source
/// with zero rows normalizes to nothing.
///
/// `plan_name_canonical` starts as the raw name; the engine's alias resolver
/// overwrites it.
pub fn normalize(
    raw_rows: &[RawRow],
    source: Source,
    config: &ReconConfig,
) -> Result<(Vec<EnrollmentRecord>, Vec<ErrorRecord>), ReconError> {
    let Some(first) = raw_rows.first() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let columns = resolve_headers(first.keys(), source)?;
    let cell = |row: &RawRow, column: &'static str| -> String {
        columns
            .get(column)
            .and_then(|raw| row.get(raw))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let mut records = Vec::new();
    let mut findings = Vec::new();

    for (i, row) in raw_rows.iter().enumerate() {
        let row_index = i + 1;
        let ssn_raw = cell(row, COL_SSN);
        let ssn: String = ssn_raw.chars().filter(|c| c.is_ascii_digit()).collect();
        let plan_name_raw = cell(row, COL_PLAN_NAME);

        let employee_cost = cell(row, COL_EMPLOYEE_COST);
        let employer_cost = cell(row, COL_EMPLOYER_COST);

        let mut record = EnrollmentRecord {
            source,
            row_index,
            ssn: ssn.clone(),
            first_name: cell(row, COL_FIRST_NAME),
            last_name: cell(row, COL_LAST_NAME),
            plan_name_canonical: plan_name_raw.clone(),
            plan_name_raw,
            employee_cost_cents: 0,
            employer_cost_cents: 0,
        };

        if ssn.len() != config.ssn_digit_length {
            findings.push(ErrorRecord {
                category: ErrorCategory::MalformedSsn,
                ssn,
                detail: format!(
                    "{source} row {row_index}: SSN '{ssn_raw}' has {} digit(s), expected {}",
                    record.ssn.len(),
                    config.ssn_digit_length
                ),
                source_records: vec![record],
            });
            continue;
        }

        let mut bad_cost: Option<(&'static str, String)> = None;
        for (column, value, slot) in [
            (COL_EMPLOYEE_COST, &employee_cost, &mut record.employee_cost_cents),
            (COL_EMPLOYER_COST, &employer_cost, &mut record.employer_cost_cents),
        ] {
            match parse_cost_cents(value) {
                Some(cents) if cents >= 0 => *slot = cents,
                _ => {
                    bad_cost = Some((column, value.clone()));
                    break;
                }
            }
        }
        if let Some((column, value)) = bad_cost {
            findings.push(ErrorRecord {
                category: ErrorCategory::InvalidCost,
                ssn,
                detail: format!(
                    "{source} row {row_index}: {column} '{value}' is not a non-negative amount"
                ),
                source_records: vec![record],
            });
            continue;
        }

        records.push(record);
    }

    Ok((records, findings))
}

/// Parse a decimal amount string ("120.50", "$1,234", "15") into cents.
/// At most two fraction digits; anything else is `None`.
pub fn parse_cost_cents(s: &str) -> Option<i64> {
    let mut s = s.trim();
    let negative = if let Some(rest) = s.strip_prefix('-') {
        s = rest;
        true
    } else {
        false
    };
    let cleaned: String = s
        .strip_prefix('$')
        .unwrap_or(s)
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    let cents = whole.checked_mul(100)?.checked_add(frac_cents)?;
    Some(if negative { -cents } else { cents })
}
