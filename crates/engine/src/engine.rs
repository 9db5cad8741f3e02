use std::collections::BTreeMap;
use std::time::Instant;

use crate::alias::{normalize_plan_name, AliasTable};
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{
    EnrollmentRecord, ErrorCategory, ErrorRecord, MatchGroup, RawRow, ReconInput, ReconMeta,
    ReconResult, ReconSummary, Source,
};
use crate::normalize::normalize;

/// Run reconciliation over raw uploaded rows. Returns categorized findings +
/// summary.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    run_with_deadline(config, input, None)
}

/// Like [`run`], but stops classifying once `deadline` passes. The result
/// then covers completed groups only and carries `summary.truncated = true`
/// rather than silently dropping data.
pub fn run_with_deadline(
    config: &ReconConfig,
    input: &ReconInput,
    deadline: Option<Instant>,
) -> Result<ReconResult, ReconError> {
    config.validate()?;
    if input.rows.is_empty() {
        return Err(ReconError::EmptyInput);
    }
    if input.rows.len() < 2 {
        return Err(ReconError::NotEnoughSources(input.rows.len()));
    }
    let total_records: usize = input.rows.values().map(Vec::len).sum();
    if total_records == 0 {
        return Err(ReconError::EmptyInput);
    }

    let mut records_by_source: BTreeMap<Source, Vec<EnrollmentRecord>> = BTreeMap::new();
    let mut row_findings: Vec<ErrorRecord> = Vec::new();
    for (source, rows) in &input.rows {
        let (records, findings) = normalize(rows, *source, config)?;
        records_by_source.insert(*source, records);
        row_findings.extend(findings);
    }

    Ok(classify(config, &records_by_source, row_findings, total_records, deadline))
}

/// Reconcile records that were already normalized upstream. The comparison
/// logic and output contract are identical to [`run`].
pub fn reconcile(
    config: &ReconConfig,
    records_by_source: &BTreeMap<Source, Vec<EnrollmentRecord>>,
) -> Result<ReconResult, ReconError> {
    config.validate()?;
    if records_by_source.len() < 2 {
        return Err(ReconError::NotEnoughSources(records_by_source.len()));
    }
    let total_records: usize = records_by_source.values().map(Vec::len).sum();
    if total_records == 0 {
        return Err(ReconError::EmptyInput);
    }
    Ok(classify(config, records_by_source, Vec::new(), total_records, None))
}

fn classify(
    config: &ReconConfig,
    records_by_source: &BTreeMap<Source, Vec<EnrollmentRecord>>,
    mut row_findings: Vec<ErrorRecord>,
    total_records: usize,
    deadline: Option<Instant>,
) -> ReconResult {
    let alias_table = AliasTable::from_classes(&config.alias_classes);

    let mut errors: BTreeMap<ErrorCategory, Vec<ErrorRecord>> = ErrorCategory::ALL
        .iter()
        .map(|c| (*c, Vec::new()))
        .collect();
    // Row findings arrive in source-then-row order; re-sort so every category
    // lists findings by ascending SSN. Stable sort keeps source-then-row
    // order among equal SSNs.
    row_findings.sort_by(|a, b| a.ssn.cmp(&b.ssn));
    for finding in row_findings {
        emit(&mut errors, finding);
    }

    // Sources that contributed to this run. A source absent from the input
    // entirely is not expected to hold any record.
    let present: Vec<Source> = records_by_source.keys().copied().collect();

    // Group by SSN; BTreeMap gives ascending-SSN processing order, and the
    // inner map gives source declaration order.
    let mut groups: BTreeMap<String, MatchGroup> = BTreeMap::new();
    for (source, records) in records_by_source {
        for record in records {
            groups
                .entry(record.ssn.clone())
                .or_insert_with(|| MatchGroup {
                    ssn: record.ssn.clone(),
                    by_source: BTreeMap::new(),
                })
                .by_source
                .entry(*source)
                .or_default()
                .push(record.clone());
        }
    }

    let mut truncated = false;
    for group in groups.values_mut() {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                truncated = true;
                break;
            }
        }
        classify_group(config, &alias_table, group, &present, &mut errors);
    }

    let category_counts: BTreeMap<ErrorCategory, usize> =
        errors.iter().map(|(c, v)| (*c, v.len())).collect();
    let total_findings = category_counts.values().sum();

    ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary: ReconSummary {
            total_records,
            total_findings,
            category_counts,
            truncated,
        },
        errors,
    }
}

fn emit(errors: &mut BTreeMap<ErrorCategory, Vec<ErrorRecord>>, finding: ErrorRecord) {
    errors.entry(finding.category).or_default().push(finding);
}

/// Run every per-group check. Groups are independent; findings append in
/// check order so output stays stable.
fn classify_group(
    config: &ReconConfig,
    alias_table: &AliasTable,
    group: &mut MatchGroup,
    present: &[Source],
    errors: &mut BTreeMap<ErrorCategory, Vec<ErrorRecord>>,
) {
    // Resolve canonical plan names. Unresolved names are informational and
    // never suppress the other checks, which fall back to the raw name.
    for records in group.by_source.values_mut() {
        for record in records.iter_mut() {
            let resolution = alias_table.resolve(&record.plan_name_raw, config.similarity_threshold);
            record.plan_name_canonical = resolution.canonical;
            if !resolution.matched {
                emit(errors, ErrorRecord {
                    category: ErrorCategory::UnresolvedPlanName,
                    ssn: group.ssn.clone(),
                    detail: format!(
                        "{} row {}: plan '{}' not in alias table (best score {:.3})",
                        record.source, record.row_index, record.plan_name_raw, resolution.similarity
                    ),
                    source_records: vec![record.clone()],
                });
            }
        }
    }

    // At most one record per (ssn, source) feeds the comparison; extras are
    // their own finding.
    let mut comparison: Vec<EnrollmentRecord> = Vec::new();
    for (source, records) in &group.by_source {
        if records.len() > 1 {
            emit(errors, ErrorRecord {
                category: ErrorCategory::DuplicateWithinSource,
                ssn: group.ssn.clone(),
                detail: format!("{source} supplied {} rows for this SSN", records.len()),
                source_records: records.clone(),
            });
        }
        comparison.push(records[0].clone());
    }

    // Duplicate-SSN rule: differing canonical plans within the group. Records
    // that agree on canonical plan are the same person enrolled consistently,
    // which is not an error.
    let mut distinct_plans: Vec<String> = Vec::new();
    for record in &comparison {
        let key = normalize_plan_name(&record.plan_name_canonical);
        if !distinct_plans.contains(&key) {
            distinct_plans.push(key);
        }
    }
    if distinct_plans.len() > 1 {
        emit(errors, ErrorRecord {
            category: ErrorCategory::DuplicateSsnDifferentPlan,
            ssn: group.ssn.clone(),
            detail: format!("plans differ across sources: {}", distinct_plans.join(", ")),
            source_records: comparison.clone(),
        });
    }

    // Cross-source presence: each expected source lacking a record for an SSN
    // present elsewhere.
    for source in present {
        if !group.by_source.contains_key(source) {
            emit(errors, ErrorRecord {
                category: ErrorCategory::MissingInSource,
                ssn: group.ssn.clone(),
                detail: format!("no {source} record for this SSN"),
                source_records: comparison.clone(),
            });
        }
    }

    // Cost comparison only applies when the canonical plan agrees.
    if distinct_plans.len() == 1 && comparison.len() >= 2 {
        let spread = |pick: fn(&EnrollmentRecord) -> i64| -> i64 {
            let min = comparison.iter().map(|r| pick(r)).min().unwrap_or(0);
            let max = comparison.iter().map(|r| pick(r)).max().unwrap_or(0);
            max - min
        };
        let mut mismatches: Vec<String> = Vec::new();
        let employee_spread = spread(|r| r.employee_cost_cents);
        if employee_spread > config.cost_tolerance_cents {
            mismatches.push(format!("employee cost differs by {employee_spread} cents"));
        }
        let employer_spread = spread(|r| r.employer_cost_cents);
        if employer_spread > config.cost_tolerance_cents {
            mismatches.push(format!("employer cost differs by {employer_spread} cents"));
        }
        if !mismatches.is_empty() {
            emit(errors, ErrorRecord {
                category: ErrorCategory::CostMismatch,
                ssn: group.ssn.clone(),
                detail: mismatches.join("; "),
                source_records: comparison,
            });
        }
    }
}

/// Load CSV text into raw header→value rows for [`run`].
pub fn load_csv_rows(csv_data: &str) -> Result<Vec<RawRow>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
        let mut row = RawRow::new();
        for (i, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(i) {
                row.insert(header.clone(), value.to_string());
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADERS: &str = "SSN,First Name,Last Name,Plan Name,Employee Cost,Employer Cost";

    fn input_from(pairs: &[(Source, &str)]) -> ReconInput {
        let mut rows = BTreeMap::new();
        for (source, body) in pairs {
            let csv = format!("{HEADERS}\n{body}");
            rows.insert(*source, load_csv_rows(&csv).unwrap());
        }
        ReconInput { rows }
    }

    fn count(result: &ReconResult, category: ErrorCategory) -> usize {
        result.summary.category_counts[&category]
    }

    #[test]
    fn alias_agreement_is_not_a_duplicate() {
        let input = input_from(&[
            (Source::Payroll, "123456789,Ada,Lovelace,Medical,120.50,340.00"),
            (Source::Carrier, "123-45-6789,Ada,Lovelace,Health,120.50,340.00"),
        ]);
        let result = run(&ReconConfig::default(), &input).unwrap();
        assert_eq!(result.summary.total_findings, 0);
        assert_eq!(result.summary.total_records, 2);
    }

    #[test]
    fn differing_plans_flagged_exactly_once() {
        let input = input_from(&[
            (Source::Payroll, "123456789,Ada,Lovelace,Dental,8.00,12.00"),
            (Source::Carrier, "123456789,Ada,Lovelace,Vision,8.00,12.00"),
        ]);
        let result = run(&ReconConfig::default(), &input).unwrap();
        assert_eq!(count(&result, ErrorCategory::DuplicateSsnDifferentPlan), 1);
        let finding = &result.errors[&ErrorCategory::DuplicateSsnDifferentPlan][0];
        assert_eq!(finding.source_records.len(), 2);
        assert_eq!(finding.source_records[0].source, Source::Payroll);
        assert_eq!(finding.source_records[1].source, Source::Carrier);
        // No cost comparison across differing plans.
        assert_eq!(count(&result, ErrorCategory::CostMismatch), 0);
    }

    #[test]
    fn missing_in_source_names_the_lacking_source() {
        let input = input_from(&[
            (Source::Payroll, "123456789,Ada,Lovelace,Medical,10.00,20.00"),
            (Source::Carrier, "987654321,Grace,Hopper,Dental,5.00,9.00"),
        ]);
        let result = run(&ReconConfig::default(), &input).unwrap();
        assert_eq!(count(&result, ErrorCategory::MissingInSource), 2);
        let findings = &result.errors[&ErrorCategory::MissingInSource];
        // Ascending SSN order: 123456789 (missing in carrier) first.
        assert!(findings[0].detail.contains("carrier"));
        assert_eq!(findings[0].ssn, "123456789");
        assert!(findings[1].detail.contains("payroll"));
        assert_eq!(findings[1].ssn, "987654321");
    }

    #[test]
    fn source_absent_from_run_is_not_expected() {
        // Two-way run: nothing is "missing in ben_admin".
        let input = input_from(&[
            (Source::Payroll, "123456789,Ada,Lovelace,Medical,10.00,20.00"),
            (Source::Carrier, "123456789,Ada,Lovelace,Medical,10.00,20.00"),
        ]);
        let result = run(&ReconConfig::default(), &input).unwrap();
        assert_eq!(count(&result, ErrorCategory::MissingInSource), 0);
    }

    #[test]
    fn cost_mismatch_honors_tolerance() {
        let input = input_from(&[
            (Source::Payroll, "123456789,Ada,Lovelace,Medical,10.00,20.00"),
            (Source::Carrier, "123456789,Ada,Lovelace,Medical,10.00,21.00"),
        ]);

        let exact = ReconConfig::default();
        let result = run(&exact, &input).unwrap();
        assert_eq!(count(&result, ErrorCategory::CostMismatch), 1);
        assert!(result.errors[&ErrorCategory::CostMismatch][0]
            .detail
            .contains("employer cost differs by 100 cents"));

        let tolerant = ReconConfig {
            cost_tolerance_cents: 100,
            ..ReconConfig::default()
        };
        let result = run(&tolerant, &input).unwrap();
        assert_eq!(count(&result, ErrorCategory::CostMismatch), 0);
    }

    #[test]
    fn duplicate_within_source_uses_first_row_for_comparison() {
        let input = input_from(&[
            (
                Source::Carrier,
                "123456789,Ada,Lovelace,Medical,10.00,20.00\n123456789,Ada,Lovelace,Medical,99.00,20.00",
            ),
            (Source::Payroll, "123456789,Ada,Lovelace,Medical,10.00,20.00"),
        ]);
        let result = run(&ReconConfig::default(), &input).unwrap();
        assert_eq!(count(&result, ErrorCategory::DuplicateWithinSource), 1);
        let finding = &result.errors[&ErrorCategory::DuplicateWithinSource][0];
        assert_eq!(finding.source_records.len(), 2);
        // The first carrier row (10.00) feeds comparison, so costs agree.
        assert_eq!(count(&result, ErrorCategory::CostMismatch), 0);
    }

    #[test]
    fn unresolved_plan_does_not_suppress_other_checks() {
        let input = input_from(&[
            (Source::Payroll, "123456789,Ada,Lovelace,Platinum Plus 9000,10.00,20.00"),
            (Source::Carrier, "123456789,Ada,Lovelace,Platinum Plus 9000,10.00,25.00"),
        ]);
        let result = run(&ReconConfig::default(), &input).unwrap();
        // One informational finding per unresolved record.
        assert_eq!(count(&result, ErrorCategory::UnresolvedPlanName), 2);
        // Raw names agree, so no duplicate-plan finding, but the cost check
        // still runs on the raw key.
        assert_eq!(count(&result, ErrorCategory::DuplicateSsnDifferentPlan), 0);
        assert_eq!(count(&result, ErrorCategory::CostMismatch), 1);
    }

    #[test]
    fn row_errors_partition_from_comparison_set() {
        let input = input_from(&[
            (
                Source::Payroll,
                "99,Bad,Row,Medical,10.00,20.00\n123456789,Ada,Lovelace,Medical,10.00,20.00",
            ),
            (
                Source::Carrier,
                "123456789,Ada,Lovelace,Medical,abc,20.00\n123456789,Ada,Lovelace,Medical,10.00,20.00",
            ),
        ]);
        let result = run(&ReconConfig::default(), &input).unwrap();
        assert_eq!(result.summary.total_records, 4);
        assert_eq!(count(&result, ErrorCategory::MalformedSsn), 1);
        assert_eq!(count(&result, ErrorCategory::InvalidCost), 1);
        // The invalid-cost carrier row is excluded: only one carrier record
        // remains, so no duplicate-within-source and no mismatch.
        assert_eq!(count(&result, ErrorCategory::DuplicateWithinSource), 0);
        assert_eq!(count(&result, ErrorCategory::CostMismatch), 0);
        // The malformed payroll row never creates a group: 99 is not
        // "missing in carrier".
        assert_eq!(count(&result, ErrorCategory::MissingInSource), 0);
    }

    #[test]
    fn row_findings_sorted_by_ssn_within_category() {
        let input = input_from(&[
            (
                Source::Payroll,
                "555,Bad,Row,Medical,1,2\n123456789,Ada,Lovelace,Medical,10.00,20.00",
            ),
            (
                Source::Carrier,
                "11,Worse,Row,Medical,1,2\n123456789,Ada,Lovelace,Medical,10.00,20.00",
            ),
        ]);
        let result = run(&ReconConfig::default(), &input).unwrap();
        let malformed = &result.errors[&ErrorCategory::MalformedSsn];
        let ssns: Vec<&str> = malformed.iter().map(|f| f.ssn.as_str()).collect();
        // The payroll finding would come first in input order; output order
        // is ascending SSN.
        assert_eq!(ssns, ["11", "555"]);
    }

    #[test]
    fn runs_are_deterministic() {
        let input = input_from(&[
            (
                Source::Payroll,
                "123456789,Ada,Lovelace,Dental,8.00,12.00\n987654321,Grace,Hopper,Medical,10.00,20.00",
            ),
            (Source::Carrier, "123456789,Ada,Lovelace,Vision,8.00,13.00"),
        ]);
        let config = ReconConfig::default();
        let a = run(&config, &input).unwrap();
        let b = run(&config, &input).unwrap();
        assert_eq!(
            serde_json::to_string(&a.errors).unwrap(),
            serde_json::to_string(&b.errors).unwrap()
        );
        assert_eq!(a.summary.category_counts, b.summary.category_counts);
    }

    #[test]
    fn expired_deadline_truncates_instead_of_dropping() {
        let input = input_from(&[
            (Source::Payroll, "123456789,Ada,Lovelace,Dental,8.00,12.00"),
            (Source::Carrier, "123456789,Ada,Lovelace,Vision,8.00,12.00"),
        ]);
        let deadline = Instant::now() - std::time::Duration::from_secs(1);
        let result =
            run_with_deadline(&ReconConfig::default(), &input, Some(deadline)).unwrap();
        assert!(result.summary.truncated);
        assert_eq!(count(&result, ErrorCategory::DuplicateSsnDifferentPlan), 0);
        // Totals still reflect the full input.
        assert_eq!(result.summary.total_records, 2);
    }

    #[test]
    fn structural_failures_are_errors_not_findings() {
        let config = ReconConfig::default();

        let empty = ReconInput { rows: BTreeMap::new() };
        assert!(matches!(run(&config, &empty), Err(ReconError::EmptyInput)));

        let mut rows = BTreeMap::new();
        rows.insert(
            Source::Payroll,
            load_csv_rows(&format!("{HEADERS}\n123456789,Ada,Lovelace,Medical,1,2")).unwrap(),
        );
        let single = ReconInput { rows };
        assert!(matches!(
            run(&config, &single),
            Err(ReconError::NotEnoughSources(1))
        ));
    }

    #[test]
    fn summary_counts_match_emitted_findings() {
        let input = input_from(&[
            (
                Source::Payroll,
                "123456789,Ada,Lovelace,Dental,8.00,12.00\n99,Bad,Row,Medical,1,2",
            ),
            (Source::Carrier, "123456789,Ada,Lovelace,Vision,8.00,12.00"),
        ]);
        let result = run(&ReconConfig::default(), &input).unwrap();
        for (category, findings) in &result.errors {
            assert_eq!(result.summary.category_counts[category], findings.len());
        }
        assert_eq!(
            result.summary.total_findings,
            result.errors.values().map(Vec::len).sum::<usize>()
        );
        // Every category key is present even at zero.
        assert_eq!(result.summary.category_counts.len(), ErrorCategory::ALL.len());
    }
}
