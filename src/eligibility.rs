//! Eligibility filtering.
//!
//! Deterministic rules run first and are final: an employee matched by a
//! rule is excluded whatever the oracle says about the job title. Only the
//! titles of employees no rule matched are sent to the classification
//! oracle. A title the oracle cannot classify excludes its holders with an
//! `UNRESOLVED` entry; the run continues.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ExclusionRule, RuleMatcher};
use crate::consolidation::ConsolidatedSnapshot;
use crate::error::{EngineError, EngineResult, OracleError};
use crate::models::{
    EmployeeRecord, EmploymentStatus, ExclusionEntry, ExclusionReport, ExclusionVerdict,
    VerdictSource,
};
use crate::oracle::ClassificationHints;
use crate::pipeline::RunContext;

/// Id of the non-configurable rule excluding terminated employees.
pub const TERMINATED_RULE_ID: &str = "status.terminated";

/// Output of the eligibility stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilitySnapshot {
    /// Employees who receive the benefit, ordered by id.
    pub eligible: Vec<EmployeeRecord>,
    /// Everyone excluded and why, ordered by id.
    pub report: ExclusionReport,
    /// Oracle verdicts issued this run, keyed by trimmed title.
    pub verdicts: BTreeMap<String, ExclusionVerdict>,
}

/// Returns true if `rule` matches `record`.
///
/// Title matchers compare trimmed, case-insensitive text.
pub fn rule_matches(rule: &ExclusionRule, record: &EmployeeRecord) -> bool {
    let title = record.job_title.trim().to_uppercase();
    match &rule.matcher {
        RuleMatcher::TitleEquals(expected) => title == expected.trim().to_uppercase(),
        RuleMatcher::TitleContains(fragment) => title.contains(&fragment.trim().to_uppercase()),
        RuleMatcher::Status(status) => record.status == *status,
        RuleMatcher::Tag(tag) => record.has_tag(*tag),
    }
}

/// The first deterministic rule excluding `record`, as a report entry.
fn rule_exclusion(rules: &[ExclusionRule], record: &EmployeeRecord) -> Option<ExclusionEntry> {
    let entry = |rule_id: &str, reason: String| ExclusionEntry {
        employee_id: record.id.clone(),
        job_title: record.job_title.clone(),
        reason,
        source: VerdictSource::Rule {
            rule_id: rule_id.to_string(),
        },
    };

    if let Some(rule) = rules.iter().find(|rule| rule_matches(rule, record)) {
        let reason = if rule.description.is_empty() {
            format!("matched rule '{}'", rule.id)
        } else {
            rule.description.clone()
        };
        return Some(entry(&rule.id, reason));
    }
    if record.status == EmploymentStatus::Terminated {
        return Some(entry(TERMINATED_RULE_ID, "terminated before the active snapshot date".to_string()));
    }
    None
}

/// Partitions records given the rules and a set of oracle outcomes.
///
/// Pure and deterministic: the same records, rules and outcomes always
/// produce the same partition. A record whose title has no outcome in
/// `outcomes` is treated as unresolved.
///
/// # Arguments
///
/// * `records` - Consolidated records
/// * `rules` - Deterministic exclusion rules, in evaluation order
/// * `outcomes` - Oracle outcomes keyed by trimmed job title
///
/// # Returns
///
/// The eligible records and the exclusion report, both ordered by id.
pub fn partition(
    records: &[EmployeeRecord],
    rules: &[ExclusionRule],
    outcomes: &BTreeMap<String, Result<ExclusionVerdict, OracleError>>,
) -> (Vec<EmployeeRecord>, ExclusionReport) {
    let mut eligible = Vec::new();
    let mut entries = Vec::new();

    for record in records {
        if let Some(entry) = rule_exclusion(rules, record) {
            entries.push(entry);
            continue;
        }

        let title = record.job_title.trim();
        match outcomes.get(title) {
            Some(Ok(verdict)) if verdict.excluded => entries.push(ExclusionEntry {
                employee_id: record.id.clone(),
                job_title: record.job_title.clone(),
                reason: verdict.justification.clone(),
                source: VerdictSource::Oracle,
            }),
            Some(Ok(_)) => eligible.push(record.clone()),
            Some(Err(error)) => entries.push(ExclusionEntry {
                employee_id: record.id.clone(),
                job_title: record.job_title.clone(),
                reason: error.to_string(),
                source: VerdictSource::Unresolved,
            }),
            None => entries.push(ExclusionEntry {
                employee_id: record.id.clone(),
                job_title: record.job_title.clone(),
                reason: "no classification available".to_string(),
                source: VerdictSource::Unresolved,
            }),
        }
    }

    eligible.sort_by(|a, b| a.id.cmp(&b.id));
    entries.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
    (eligible, ExclusionReport { entries })
}

/// Titles no rule decides, with the hints sent to the oracle.
fn undecided_titles(
    records: &[EmployeeRecord],
    rules: &[ExclusionRule],
) -> BTreeMap<String, ClassificationHints> {
    let mut titles: BTreeMap<String, ClassificationHints> = BTreeMap::new();
    for record in records.iter().filter(|r| rule_exclusion(rules, r).is_none()) {
        let hints = titles.entry(record.job_title.trim().to_string()).or_default();
        hints.headcount += 1;
        hints.states.insert(record.location.state.clone());
    }
    titles
}

/// Runs the eligibility stage.
///
/// Distinct undecided titles are classified concurrently, bounded by the
/// configured concurrency.
///
/// # Returns
///
/// The eligibility snapshot, or `EngineError::Cancelled` if the run was
/// cancelled while classifying.
pub async fn filter_eligibility(
    ctx: &RunContext,
    consolidated: &ConsolidatedSnapshot,
) -> EngineResult<EligibilitySnapshot> {
    let rules = ctx.config().rules();
    let titles = undecided_titles(&consolidated.records, rules);
    info!(
        stage = "eligibility",
        run_id = %ctx.run_id(),
        records = consolidated.records.len(),
        titles = titles.len(),
        "Classifying job titles"
    );

    let outcomes = ctx
        .classification()
        .classify_all(titles, ctx.concurrency(), ctx.cancel())
        .await;

    ctx.cancel().check("eligibility")?;
    if outcomes
        .values()
        .any(|outcome| matches!(outcome, Err(OracleError::Cancelled)))
    {
        return Err(EngineError::Cancelled {
            stage: "eligibility".to_string(),
        });
    }

    let (eligible, report) = partition(&consolidated.records, rules, &outcomes);
    let verdicts = outcomes
        .into_iter()
        .filter_map(|(title, outcome)| outcome.ok().map(|verdict| (title, verdict)))
        .collect();

    let unresolved = report.unresolved_ids();
    if !unresolved.is_empty() {
        warn!(
            stage = "eligibility",
            unresolved = unresolved.len(),
            "Employees excluded as UNRESOLVED"
        );
    }
    info!(
        stage = "eligibility",
        eligible = eligible.len(),
        excluded = report.len(),
        "Eligibility complete"
    );

    Ok(EligibilitySnapshot {
        eligible,
        report,
        verdicts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLoader, OracleSettings, RunConfig};
    use crate::models::{Location, RecordTag};
    use crate::oracle::{MockCalendarResolver, MockClassificationOracle};
    use crate::pipeline::CancelSignal;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn load_config() -> RunConfig {
        let config = ConfigLoader::load("./config/vr_2025_05")
            .expect("Failed to load config")
            .into_config();
        config.with_oracle_settings(OracleSettings {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            timeout_ms: 200,
            ..OracleSettings::default()
        })
    }

    fn create_test_record(id: &str, title: &str) -> EmployeeRecord {
        EmployeeRecord {
            id: id.to_string(),
            name: None,
            job_title: title.to_string(),
            status: EmploymentStatus::Active,
            admission_date: None,
            termination_date: None,
            vacations: Vec::new(),
            location: Location {
                municipality: None,
                state: "SP".to_string(),
            },
            daily_rate: Decimal::new(3750, 2),
            tags: BTreeSet::new(),
        }
    }

    fn verdict(title: &str, excluded: bool) -> ExclusionVerdict {
        ExclusionVerdict {
            job_title: title.to_string(),
            excluded,
            justification: format!("fixed verdict for {}", title),
            source: VerdictSource::Oracle,
        }
    }

    fn context(oracle: MockClassificationOracle) -> RunContext {
        RunContext::new(
            Arc::new(load_config()),
            Arc::new(oracle),
            Arc::new(MockCalendarResolver::new()),
            CancelSignal::never(),
        )
    }

    fn snapshot(records: Vec<EmployeeRecord>) -> ConsolidatedSnapshot {
        ConsolidatedSnapshot {
            records,
            ..ConsolidatedSnapshot::default()
        }
    }

    #[test]
    fn test_rule_matching_is_case_insensitive() {
        let config = load_config();
        let director = &config.rules()[0];
        assert!(rule_matches(director, &create_test_record("1", "Diretor Comercial")));
        assert!(!rule_matches(director, &create_test_record("2", "ANALISTA")));
    }

    #[test]
    fn test_rule_overrides_oracle_verdict() {
        let config = load_config();
        let records = vec![create_test_record("1001", "DIRETOR FINANCEIRO")];
        let outcomes = BTreeMap::from([(
            "DIRETOR FINANCEIRO".to_string(),
            Ok(verdict("DIRETOR FINANCEIRO", false)),
        )]);

        let (eligible, report) = partition(&records, config.rules(), &outcomes);

        assert!(eligible.is_empty());
        assert_eq!(
            report.entries[0].source,
            VerdictSource::Rule {
                rule_id: "title.director".to_string()
            }
        );
    }

    #[test]
    fn test_rule_overrides_oracle_regardless_of_rule_order() {
        let config = load_config();
        let mut reversed: Vec<ExclusionRule> = config.rules().to_vec();
        reversed.reverse();

        let mut intern = create_test_record("1001", "ANALISTA");
        intern.tags.insert(RecordTag::Intern);
        let records = vec![intern];
        let outcomes = BTreeMap::from([("ANALISTA".to_string(), Ok(verdict("ANALISTA", false)))]);

        for rules in [config.rules().to_vec(), reversed] {
            let (eligible, report) = partition(&records, &rules, &outcomes);
            assert!(eligible.is_empty());
            assert_eq!(
                report.entries[0].source,
                VerdictSource::Rule {
                    rule_id: "tag.intern".to_string()
                }
            );
        }
    }

    #[test]
    fn test_terminated_excluded_by_builtin_rule() {
        let mut record = create_test_record("1001", "ANALISTA");
        record.status = EmploymentStatus::Terminated;
        let outcomes = BTreeMap::from([("ANALISTA".to_string(), Ok(verdict("ANALISTA", false)))]);

        let (eligible, report) = partition(&[record], &[], &outcomes);

        assert!(eligible.is_empty());
        assert_eq!(
            report.entries[0].source,
            VerdictSource::Rule {
                rule_id: TERMINATED_RULE_ID.to_string()
            }
        );
    }

    #[test]
    fn test_partition_is_idempotent_with_fixed_verdicts() {
        let config = load_config();
        let records = vec![
            create_test_record("1001", "ANALISTA"),
            create_test_record("1002", "DIRETOR"),
            create_test_record("1003", "CONSULTOR EXTERNO"),
            create_test_record("1004", "SUPERVISOR"),
        ];
        let outcomes = BTreeMap::from([
            ("ANALISTA".to_string(), Ok(verdict("ANALISTA", false))),
            (
                "CONSULTOR EXTERNO".to_string(),
                Ok(verdict("CONSULTOR EXTERNO", true)),
            ),
            (
                "SUPERVISOR".to_string(),
                Err(OracleError::Timeout { timeout_ms: 10 }),
            ),
        ]);

        let first = partition(&records, config.rules(), &outcomes);
        let second = partition(&records, config.rules(), &outcomes);

        assert_eq!(first, second);
        assert_eq!(first.0.len(), 1);
        assert_eq!(first.1.len(), 3);
        assert_eq!(first.1.unresolved_ids(), vec!["1004".to_string()]);
    }

    #[tokio::test]
    async fn test_oracle_called_once_per_undecided_title() {
        let mut oracle = MockClassificationOracle::new();
        oracle
            .expect_classify()
            .withf(|request| request.job_title == "ANALISTA")
            .times(1)
            .returning(|request| {
                assert_eq!(request.context.as_ref().unwrap().headcount, 2);
                Ok(json!({"excluded": false, "justification": "Regular staff"}))
            });

        let ctx = context(oracle);
        let result = filter_eligibility(
            &ctx,
            &snapshot(vec![
                create_test_record("1001", "ANALISTA"),
                create_test_record("1002", "ANALISTA "),
                create_test_record("1003", "DIRETOR"),
            ]),
        )
        .await
        .unwrap();

        assert_eq!(result.eligible.len(), 2);
        assert_eq!(result.report.len(), 1);
        assert!(result.verdicts.contains_key("ANALISTA"));
    }

    #[tokio::test]
    async fn test_unavailable_oracle_excludes_as_unresolved() {
        let mut oracle = MockClassificationOracle::new();
        oracle.expect_classify().times(2).returning(|_| {
            Err(OracleError::Transport {
                message: "503 Service Unavailable".to_string(),
            })
        });

        let ctx = context(oracle);
        let result = filter_eligibility(&ctx, &snapshot(vec![create_test_record("1001", "ANALISTA")]))
            .await
            .unwrap();

        assert!(result.eligible.is_empty());
        assert!(result.report.entries[0].is_unresolved());
        assert!(result.verdicts.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_publishes_nothing() {
        let (handle, signal) = crate::pipeline::cancel_pair();
        handle.cancel();
        let mut oracle = MockClassificationOracle::new();
        oracle.expect_classify().returning(|_| {
            Ok(json!({"excluded": false, "justification": "Regular staff"}))
        });

        let ctx = RunContext::new(
            Arc::new(load_config()),
            Arc::new(oracle),
            Arc::new(MockCalendarResolver::new()),
            signal,
        );
        let result =
            filter_eligibility(&ctx, &snapshot(vec![create_test_record("1001", "ANALISTA")])).await;

        assert!(matches!(result, Err(EngineError::Cancelled { .. })));
    }
}
