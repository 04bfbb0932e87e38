//! Run summary: failures, warnings and the overall exit status

use crate::errors::{LineageConfigError, Warning, WarningKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    SourceReadError,
    /// Never scheduled because cancellation was requested first
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFailure {
    pub table: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum LineageOutcome {
    Written { nodes: usize, edges: usize },
    Withheld { error: String },
}

impl LineageOutcome {
    pub fn withheld(error: &LineageConfigError) -> Self {
        LineageOutcome::Withheld {
            error: format!("LineageConfigError: {}", error),
        }
    }

    pub fn is_withheld(&self) -> bool {
        matches!(self, LineageOutcome::Withheld { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub as_of: DateTime<Utc>,
    pub tables_scheduled: usize,
    pub tables_profiled: Vec<String>,
    pub failures: Vec<TableFailure>,
    pub warning_counts: BTreeMap<WarningKind, usize>,
    pub warnings: Vec<Warning>,
    pub lineage: LineageOutcome,
    pub glossary_terms: usize,
    pub exit_code: i32,
}

/// Everything a finished run reports, before ordering and counting
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub started_at: DateTime<Utc>,
    pub as_of: DateTime<Utc>,
    pub tables_scheduled: usize,
    pub tables_profiled: Vec<String>,
    pub failures: Vec<TableFailure>,
    pub warnings: Vec<Warning>,
    pub lineage: LineageOutcome,
    pub glossary_terms: usize,
}

impl RunSummary {
    pub fn new(outcome: RunOutcome) -> Self {
        let RunOutcome {
            started_at,
            as_of,
            tables_scheduled,
            mut tables_profiled,
            mut failures,
            mut warnings,
            lineage,
            glossary_terms,
        } = outcome;
        tables_profiled.sort();
        failures.sort();
        warnings.sort();

        let mut warning_counts = BTreeMap::new();
        for warning in &warnings {
            *warning_counts.entry(warning.kind).or_insert(0) += 1;
        }

        let exit_code = exit_code(&failures, &lineage);
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            as_of,
            tables_scheduled,
            tables_profiled,
            failures,
            warning_counts,
            warnings,
            lineage,
            glossary_terms,
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// 1 when any table failed, 2 when only the lineage document was withheld.
/// Warnings never influence the code.
pub fn exit_code(failures: &[TableFailure], lineage: &LineageOutcome) -> i32 {
    if !failures.is_empty() {
        1
    } else if lineage.is_withheld() {
        2
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(table: &str, kind: FailureKind) -> TableFailure {
        TableFailure {
            table: table.to_string(),
            kind,
            message: "boom".to_string(),
        }
    }

    fn written() -> LineageOutcome {
        LineageOutcome::Written { nodes: 3, edges: 2 }
    }

    fn outcome(now: DateTime<Utc>) -> RunOutcome {
        RunOutcome {
            started_at: now,
            as_of: now,
            tables_scheduled: 0,
            tables_profiled: vec![],
            failures: vec![],
            warnings: vec![],
            lineage: written(),
            glossary_terms: 0,
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&[], &written()), 0);
        let withheld = LineageOutcome::withheld(&LineageConfigError::DuplicateNode("x".into()));
        assert_eq!(exit_code(&[], &withheld), 2);
        assert_eq!(
            exit_code(&[failure("t", FailureKind::SourceReadError)], &withheld),
            1
        );
    }

    #[test]
    fn test_warnings_do_not_affect_exit_status() {
        let warnings = vec![
            Warning::new(WarningKind::EmptyColumn, "empty").for_table("b"),
            Warning::new(WarningKind::ClassificationWarning, "no match").for_table("a"),
            Warning::new(WarningKind::EmptyColumn, "empty").for_table("a"),
        ];
        let now = Utc::now();
        let summary = RunSummary::new(RunOutcome {
            tables_scheduled: 2,
            tables_profiled: vec!["b".into(), "a".into()],
            warnings,
            ..outcome(now)
        });
        assert!(summary.is_success());
        assert_eq!(summary.tables_profiled, vec!["a", "b"]);
        assert_eq!(summary.warning_counts[&WarningKind::EmptyColumn], 2);
        assert!(summary.warnings.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_serialized_shape() {
        let now = Utc::now();
        let summary = RunSummary::new(RunOutcome {
            tables_scheduled: 1,
            failures: vec![failure("dim_date", FailureKind::SourceReadError)],
            ..outcome(now)
        });
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["failures"][0]["kind"], "SourceReadError");
        assert_eq!(json["lineage"]["status"], "written");
        assert_eq!(json["exitCode"], 1);
    }
}
