//! Six-dimension data quality scoring and the DQ tests behind it

use crate::column_profiler::{round1, ColumnProfile};
use crate::data_source::{CellValue, Table};
use crate::errors::{Warning, WarningKind};
use crate::patterns::{parse_date, parse_number, ColumnType};
use crate::{CatalogueError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QualityDimension {
    Completeness,
    Accuracy,
    Consistency,
    Timeliness,
    Uniqueness,
    Validity,
}

impl QualityDimension {
    pub fn all() -> [QualityDimension; 6] {
        [
            QualityDimension::Completeness,
            QualityDimension::Accuracy,
            QualityDimension::Consistency,
            QualityDimension::Timeliness,
            QualityDimension::Uniqueness,
            QualityDimension::Validity,
        ]
    }
}

impl fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityDimension::Completeness => "completeness",
            QualityDimension::Accuracy => "accuracy",
            QualityDimension::Consistency => "consistency",
            QualityDimension::Timeliness => "timeliness",
            QualityDimension::Uniqueness => "uniqueness",
            QualityDimension::Validity => "validity",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValueRange {
    fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }
}

/// Cross-column predicates evaluated row by row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConsistencyRule {
    /// Non-null values of `column` must be one of `values`
    Enum { column: String, values: Vec<String> },
    /// Whenever `column` is populated, `requires` must be populated too
    Pairing { column: String, requires: String },
    /// `before <= after` whenever both are populated
    Ordering { before: String, after: String },
}

impl ConsistencyRule {
    fn columns(&self) -> [&str; 2] {
        match self {
            ConsistencyRule::Enum { column, .. } => [column.as_str(), column.as_str()],
            ConsistencyRule::Pairing { column, requires } => [column.as_str(), requires.as_str()],
            ConsistencyRule::Ordering { before, after } => [before.as_str(), after.as_str()],
        }
    }

    fn label(&self) -> String {
        match self {
            ConsistencyRule::Enum { column, .. } => format!("enum({})", column),
            ConsistencyRule::Pairing { column, requires } => {
                format!("pairing({}=>{})", column, requires)
            }
            ConsistencyRule::Ordering { before, after } => {
                format!("ordering({}<={})", before, after)
            }
        }
    }
}

/// Declared expectations for one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityRules {
    pub ranges: BTreeMap<String, ValueRange>,
    pub allowed_values: BTreeMap<String, Vec<String>>,
    pub rules: Vec<ConsistencyRule>,
    pub key_columns: Vec<String>,
    pub column_types: BTreeMap<String, ColumnType>,
    pub freshness_column: Option<String>,
}

impl QualityRules {
    /// Every column some rule refers to, in name order
    pub fn declared_columns(&self) -> BTreeSet<&str> {
        let mut columns: BTreeSet<&str> = BTreeSet::new();
        columns.extend(self.ranges.keys().map(String::as_str));
        columns.extend(self.allowed_values.keys().map(String::as_str));
        columns.extend(self.rules.iter().flat_map(ConsistencyRule::columns));
        columns.extend(self.key_columns.iter().map(String::as_str));
        columns.extend(self.column_types.keys().map(String::as_str));
        columns.extend(self.freshness_column.as_deref());
        columns
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityThresholds {
    /// Applies to every dimension without an explicit entry
    pub default: f64,
    pub dimensions: BTreeMap<QualityDimension, f64>,
    /// Largest null rate (%) a column may have and still pass its completeness test
    pub max_null_rate: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            default: 90.0,
            dimensions: BTreeMap::new(),
            max_null_rate: 5.0,
        }
    }
}

impl QualityThresholds {
    pub fn for_dimension(&self, dimension: QualityDimension) -> f64 {
        self.dimensions
            .get(&dimension)
            .copied()
            .unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        let bad = std::iter::once(self.default)
            .chain(self.dimensions.values().copied())
            .chain(std::iter::once(self.max_null_rate))
            .find(|v| !in_range(*v));
        match bad {
            Some(v) => Err(CatalogueError::Configuration(format!(
                "quality thresholds must be within [0, 100], got {}",
                v
            ))),
            None => Ok(()),
        }
    }
}

/// One pass/fail predicate instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DqTest {
    pub name: String,
    pub dimension: QualityDimension,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScore {
    pub dimension: QualityDimension,
    /// `None` when the dimension does not apply to the table
    pub score: Option<f64>,
    pub tests_passed: usize,
    pub tests_total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableQuality {
    pub score: f64,
    pub dimensions: Vec<DimensionScore>,
    pub tests_passed: usize,
    pub tests_total: usize,
    pub tests: Vec<DqTest>,
}

impl TableQuality {
    pub fn dimension(&self, dimension: QualityDimension) -> Option<f64> {
        self.dimensions
            .iter()
            .find(|d| d.dimension == dimension)
            .and_then(|d| d.score)
    }
}

/// Inputs a table contributes besides its data
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub rules: &'a QualityRules,
    pub sla_hours: Option<f64>,
    pub as_of: DateTime<Utc>,
}

pub struct QualityScorer {
    thresholds: QualityThresholds,
}

/// Running tally for one dimension
#[derive(Default)]
struct Tally {
    score: Option<f64>,
    tests: Vec<DqTest>,
}

impl Tally {
    fn test(&mut self, dimension: QualityDimension, name: String, passed: bool) {
        self.tests.push(DqTest {
            name,
            dimension,
            passed,
        });
    }
}

impl QualityScorer {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn score(
        &self,
        table: &Table,
        columns: &[ColumnProfile],
        ctx: ScoringContext<'_>,
    ) -> (TableQuality, Vec<Warning>) {
        let tallies = [
            (QualityDimension::Completeness, self.completeness(columns)),
            (QualityDimension::Accuracy, accuracy(table, ctx.rules)),
            (QualityDimension::Consistency, consistency(table, ctx.rules)),
            (QualityDimension::Timeliness, timeliness(table, ctx)),
            (QualityDimension::Uniqueness, uniqueness(table, columns, ctx.rules)),
            (QualityDimension::Validity, validity(table, columns, ctx.rules)),
        ];

        // Rules on absent columns fail in their own dimension; name them here
        let mut warnings: Vec<Warning> = ctx
            .rules
            .declared_columns()
            .into_iter()
            .filter(|column| table.column_index(column).is_none())
            .map(|column| {
                Warning::new(
                    WarningKind::QualityThresholdBreach,
                    "quality rule refers to a column the table does not have",
                )
                .for_table(&table.name)
                .for_column(column)
            })
            .collect();
        let mut dimensions = Vec::with_capacity(tallies.len());
        let mut tests = Vec::new();

        for (dimension, tally) in tallies {
            let score = tally.score.map(round1);
            if let Some(score) = score {
                let threshold = self.thresholds.for_dimension(dimension);
                if score < threshold {
                    warnings.push(
                        Warning::new(
                            WarningKind::QualityThresholdBreach,
                            format!(
                                "{} score {:.1} is below threshold {:.1}",
                                dimension, score, threshold
                            ),
                        )
                        .for_table(&table.name),
                    );
                }
            }
            let tests_passed = tally.tests.iter().filter(|t| t.passed).count();
            dimensions.push(DimensionScore {
                dimension,
                score,
                tests_passed,
                tests_total: tally.tests.len(),
            });
            tests.extend(tally.tests);
        }

        let applicable: Vec<f64> = dimensions.iter().filter_map(|d| d.score).collect();
        let score = if applicable.is_empty() {
            0.0
        } else {
            round1(applicable.iter().sum::<f64>() / applicable.len() as f64)
        };

        let tests_passed = tests.iter().filter(|t| t.passed).count();
        let quality = TableQuality {
            score,
            dimensions,
            tests_passed,
            tests_total: tests.len(),
            tests,
        };
        (quality, warnings)
    }

    fn completeness(&self, columns: &[ColumnProfile]) -> Tally {
        let mut tally = Tally::default();
        if columns.is_empty() {
            return tally;
        }
        let avg_null = columns.iter().map(|c| c.null_rate).sum::<f64>() / columns.len() as f64;
        tally.score = Some(100.0 - avg_null);
        for column in columns {
            tally.test(
                QualityDimension::Completeness,
                format!("completeness:{}", column.name),
                column.null_rate <= self.thresholds.max_null_rate,
            );
        }
        tally
    }
}

fn accuracy(table: &Table, rules: &QualityRules) -> Tally {
    let mut tally = Tally::default();
    if rules.ranges.is_empty() && rules.allowed_values.is_empty() {
        return tally;
    }

    let mut checked = 0usize;
    let mut in_domain = 0usize;
    let mut check = |column: &str, predicate: &dyn Fn(&str) -> bool| -> bool {
        let Some(idx) = table.column_index(column) else {
            checked += table.row_count();
            return false;
        };
        let mut all_ok = true;
        for value in table.column_values(idx).filter_map(CellValue::render) {
            checked += 1;
            if predicate(&*value) {
                in_domain += 1;
            } else {
                all_ok = false;
            }
        }
        all_ok
    };

    for (column, range) in &rules.ranges {
        let passed = check(column.as_str(), &|v: &str| {
            parse_number(v).map_or(false, |n| range.contains(n))
        });
        tally.test(QualityDimension::Accuracy, format!("accuracy:range({})", column), passed);
    }
    for (column, allowed) in &rules.allowed_values {
        let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
        let passed = check(column.as_str(), &|v: &str| allowed.contains(v));
        tally.test(QualityDimension::Accuracy, format!("accuracy:domain({})", column), passed);
    }

    tally.score = Some(ratio_score(in_domain, checked));
    tally
}

fn consistency(table: &Table, rules: &QualityRules) -> Tally {
    let mut tally = Tally::default();
    if rules.rules.is_empty() {
        return tally;
    }

    let rows = table.row_count();
    let mut evaluations = 0usize;
    let mut passes = 0usize;

    for rule in &rules.rules {
        let passed_rows = match rule {
            ConsistencyRule::Enum { column, values } => {
                let allowed: HashSet<&str> = values.iter().map(String::as_str).collect();
                count_rows(table, &[column], |cells| match cells[0].render() {
                    None => true,
                    Some(v) => allowed.contains(&*v),
                })
            }
            ConsistencyRule::Pairing { column, requires } => {
                count_rows(table, &[column, requires], |cells| {
                    cells[0].is_null() || !cells[1].is_null()
                })
            }
            ConsistencyRule::Ordering { before, after } => {
                count_rows(table, &[before, after], |cells| {
                    match (cells[0].render(), cells[1].render()) {
                        (Some(a), Some(b)) => compare_values(&a, &b) != Ordering::Greater,
                        _ => true,
                    }
                })
            }
        };
        evaluations += rows;
        passes += passed_rows;
        tally.test(
            QualityDimension::Consistency,
            format!("consistency:{}", rule.label()),
            passed_rows == rows,
        );
    }

    tally.score = Some(ratio_score(passes, evaluations));
    tally
}

/// Rows for which `predicate` holds. A missing column fails every row.
fn count_rows<F>(table: &Table, columns: &[&String], predicate: F) -> usize
where
    F: Fn(&[&CellValue]) -> bool,
{
    let indices: Option<Vec<usize>> = columns.iter().map(|c| table.column_index(c)).collect();
    let Some(indices) = indices else {
        return 0;
    };
    (0..table.row_count())
        .filter(|&row| {
            let cells: Vec<&CellValue> = indices.iter().map(|&i| table.cell(row, i)).collect();
            predicate(&cells)
        })
        .count()
}

fn compare_values(a: &str, b: &str) -> Ordering {
    if let (Some(x), Some(y)) = (parse_number(a), parse_number(b)) {
        return x.total_cmp(&y);
    }
    if let (Some(x), Some(y)) = (parse_timestamp(a), parse_timestamp(b)) {
        return x.cmp(&y);
    }
    a.cmp(b)
}

fn timeliness(table: &Table, ctx: ScoringContext<'_>) -> Tally {
    let mut tally = Tally::default();
    let Some(sla_hours) = ctx.sla_hours else {
        return tally;
    };

    let freshest = match &ctx.rules.freshness_column {
        Some(column) => {
            let Some(idx) = table.column_index(column) else {
                tally.score = Some(0.0);
                tally.test(
                    QualityDimension::Timeliness,
                    format!("timeliness:sla({}h)", sla_hours),
                    false,
                );
                return tally;
            };
            table
                .column_values(idx)
                .filter_map(|v| v.render().and_then(|s| parse_timestamp(&s)))
                .max()
        }
        None => table.modified,
    };
    let Some(freshest) = freshest else {
        return tally;
    };

    let age_hours = ((ctx.as_of - freshest).num_seconds() as f64 / 3600.0).max(0.0);
    let score = if age_hours <= sla_hours {
        100.0
    } else {
        100.0 * sla_hours / age_hours
    };
    tally.score = Some(score);
    tally.test(
        QualityDimension::Timeliness,
        format!("timeliness:sla({}h)", sla_hours),
        age_hours <= sla_hours,
    );
    tally
}

fn uniqueness(table: &Table, columns: &[ColumnProfile], rules: &QualityRules) -> Tally {
    let mut tally = Tally::default();

    let key_sets: Vec<Vec<String>> = if rules.key_columns.is_empty() {
        columns
            .iter()
            .filter(|c| c.column_type == ColumnType::Identifier)
            .map(|c| vec![c.name.clone()])
            .collect()
    } else {
        vec![rules.key_columns.clone()]
    };
    if key_sets.is_empty() {
        return tally;
    }

    let rows = table.row_count();
    let mut duplicates = 0usize;
    let mut examined = 0usize;

    for key_set in &key_sets {
        let indices: Option<Vec<usize>> =
            key_set.iter().map(|c| table.column_index(c)).collect();
        let distinct_keys = match indices {
            Some(indices) => {
                let mut seen = HashSet::new();
                for row in 0..rows {
                    let key: Option<Vec<String>> = indices
                        .iter()
                        .map(|&i| table.cell(row, i).render().map(|s| s.into_owned()))
                        .collect();
                    // Rows with an incomplete key can never count as unique
                    if let Some(key) = key {
                        seen.insert(key);
                    }
                }
                seen.len()
            }
            None => 0,
        };
        duplicates += rows - distinct_keys;
        examined += rows;
        tally.test(
            QualityDimension::Uniqueness,
            format!("uniqueness:{}", key_set.join("+")),
            distinct_keys == rows,
        );
    }

    tally.score = Some(100.0 - ratio_score(duplicates, examined));
    tally
}

fn validity(table: &Table, columns: &[ColumnProfile], rules: &QualityRules) -> Tally {
    let mut tally = Tally::default();
    let mut populated = 0usize;
    let mut conforming = 0usize;

    for profile in columns {
        let Some(idx) = table.column_index(&profile.name) else {
            continue;
        };
        let expected = rules
            .column_types
            .get(&profile.name)
            .copied()
            .unwrap_or(profile.column_type);

        let mut col_total = 0usize;
        let mut col_ok = 0usize;
        for value in table.column_values(idx).filter_map(CellValue::render) {
            col_total += 1;
            if expected.conforms(&value) {
                col_ok += 1;
            }
        }
        if col_total == 0 {
            continue;
        }
        populated += col_total;
        conforming += col_ok;
        tally.test(
            QualityDimension::Validity,
            format!("validity:{}", profile.name),
            col_ok == col_total,
        );
    }

    for column in rules.column_types.keys() {
        if table.column_index(column).is_none() {
            populated += table.row_count();
            tally.test(QualityDimension::Validity, format!("validity:{}", column), false);
        }
    }

    if populated > 0 {
        tally.score = Some(ratio_score(conforming, populated));
    }
    tally
}

fn ratio_score(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        100.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

/// RFC 3339, naive date-time, or a bare date taken as midnight UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    parse_date(value)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Row-count-weighted mean of `(score, rows)` pairs
pub fn weighted_score<I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, usize)>,
{
    let (weighted, rows) = scores
        .into_iter()
        .fold((0.0, 0usize), |(acc, n), (score, rows)| {
            (acc + score * rows as f64, n + rows)
        });
    (rows > 0).then(|| round1(weighted / rows as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_profiler::{ColumnProfiler, ProfilingConfig};
    use crate::data_source::DataSource;
    use chrono::Duration;
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> Table {
        DataSource::memory("t", columns.iter().map(|c| c.to_string()).collect(), rows)
            .load()
            .unwrap()
    }

    fn profiles(table: &Table) -> Vec<ColumnProfile> {
        let profiler = ColumnProfiler::new(ProfilingConfig::default());
        table
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| profiler.profile(&table.name, c, table.column_values(i)).profile)
            .collect()
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn score(table: &Table, rules: &QualityRules, sla: Option<f64>) -> (TableQuality, Vec<Warning>) {
        let scorer = QualityScorer::new(QualityThresholds::default());
        scorer.score(
            table,
            &profiles(table),
            ScoringContext {
                rules,
                sla_hours: sla,
                as_of: as_of(),
            },
        )
    }

    #[test]
    fn test_clean_table_scores_100() {
        let t = table(
            &["id", "amount"],
            vec![
                vec![json!("ACC-0001"), json!(10)],
                vec![json!("ACC-0002"), json!(20)],
                vec![json!("ACC-0003"), json!(30)],
            ],
        );
        let (quality, warnings) = score(&t, &QualityRules::default(), None);
        assert_eq!(quality.score, 100.0);
        assert_eq!(quality.dimension(QualityDimension::Completeness), Some(100.0));
        assert_eq!(quality.dimension(QualityDimension::Uniqueness), Some(100.0));
        assert_eq!(quality.dimension(QualityDimension::Accuracy), None);
        assert_eq!(quality.dimension(QualityDimension::Timeliness), None);
        assert_eq!(quality.tests_passed, quality.tests_total);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_score_is_mean_of_applicable_dimensions() {
        let t = table(
            &["id", "status"],
            vec![
                vec![json!(1), json!("open")],
                vec![json!(1), json!(null)],
                vec![json!(2), json!("bogus")],
                vec![json!(3), json!("closed")],
            ],
        );
        let rules = QualityRules {
            key_columns: vec!["id".into()],
            allowed_values: BTreeMap::from([(
                "status".to_string(),
                vec!["open".to_string(), "closed".to_string()],
            )]),
            ..Default::default()
        };
        let (quality, warnings) = score(&t, &rules, None);

        // status null rate 25% -> completeness 100 - 12.5
        assert_eq!(quality.dimension(QualityDimension::Completeness), Some(87.5));
        // 2 of 3 populated statuses in domain
        assert_eq!(quality.dimension(QualityDimension::Accuracy), Some(66.7));
        // one duplicate id among four rows
        assert_eq!(quality.dimension(QualityDimension::Uniqueness), Some(75.0));

        let applicable: Vec<f64> = quality.dimensions.iter().filter_map(|d| d.score).collect();
        let mean = applicable.iter().sum::<f64>() / applicable.len() as f64;
        assert!((quality.score - mean).abs() < 0.05);
        assert!(warnings
            .iter()
            .all(|w| w.kind == WarningKind::QualityThresholdBreach));
        assert!(warnings.len() >= 3);
    }

    #[test]
    fn test_consistency_rules() {
        let t = table(
            &["opened", "closed", "status", "close_reason"],
            vec![
                vec![json!("2024-01-01"), json!("2024-02-01"), json!("closed"), json!("moved")],
                vec![json!("2024-03-01"), json!("2024-02-01"), json!("closed"), json!(null)],
                vec![json!("2024-01-01"), json!(null), json!("active"), json!(null)],
            ],
        );
        let rules = QualityRules {
            rules: vec![
                ConsistencyRule::Ordering {
                    before: "opened".into(),
                    after: "closed".into(),
                },
                ConsistencyRule::Pairing {
                    column: "closed".into(),
                    requires: "close_reason".into(),
                },
                ConsistencyRule::Enum {
                    column: "status".into(),
                    values: vec!["active".into(), "closed".into()],
                },
            ],
            ..Default::default()
        };
        let (quality, _) = score(&t, &rules, None);
        let consistency = quality
            .dimensions
            .iter()
            .find(|d| d.dimension == QualityDimension::Consistency)
            .unwrap();
        // 9 row evaluations, 2 failures
        assert_eq!(consistency.score, Some(77.8));
        assert_eq!(consistency.tests_passed, 1);
        assert_eq!(consistency.tests_total, 3);
    }

    #[test]
    fn test_timeliness_from_freshness_column() {
        let fresh = (as_of() - Duration::hours(2)).to_rfc3339();
        let stale = (as_of() - Duration::hours(8)).format("%Y-%m-%d %H:%M:%S").to_string();
        let rules = QualityRules {
            freshness_column: Some("loaded_at".into()),
            ..Default::default()
        };

        let t = table(&["loaded_at"], vec![vec![json!(fresh)]]);
        let (quality, _) = score(&t, &rules, Some(4.0));
        assert_eq!(quality.dimension(QualityDimension::Timeliness), Some(100.0));

        let t = table(&["loaded_at"], vec![vec![json!(stale)]]);
        let (quality, _) = score(&t, &rules, Some(4.0));
        assert_eq!(quality.dimension(QualityDimension::Timeliness), Some(50.0));
    }

    #[test]
    fn test_rules_on_absent_columns_fail() {
        let t = table(
            &["amount", "updated_at"],
            vec![
                vec![json!(10), json!(as_of().to_rfc3339())],
                vec![json!(20), json!(as_of().to_rfc3339())],
            ],
        );
        let rules = QualityRules {
            ranges: BTreeMap::from([(
                "amout".to_string(),
                ValueRange {
                    min: Some(0.0),
                    max: Some(100.0),
                },
            )]),
            freshness_column: Some("loaded_at".into()),
            ..Default::default()
        };
        let (quality, warnings) = score(&t, &rules, Some(4.0));

        assert_eq!(quality.dimension(QualityDimension::Accuracy), Some(0.0));
        assert_eq!(quality.dimension(QualityDimension::Timeliness), Some(0.0));
        assert!(quality.score < 100.0);
        assert_eq!(quality.tests_total - quality.tests_passed, 2);

        let named: Vec<&str> = warnings
            .iter()
            .filter_map(|w| w.column.as_deref())
            .collect();
        assert_eq!(named, vec!["amout", "loaded_at"]);
        assert!(warnings
            .iter()
            .all(|w| w.kind == WarningKind::QualityThresholdBreach));
    }

    #[test]
    fn test_declared_type_on_absent_column_fails_validity() {
        let t = table(&["email"], vec![vec![json!("a@b.com")]]);
        let rules = QualityRules {
            column_types: BTreeMap::from([("emial".to_string(), ColumnType::Email)]),
            ..Default::default()
        };
        let (quality, _) = score(&t, &rules, None);
        // one conforming value against one row of the absent column
        assert_eq!(quality.dimension(QualityDimension::Validity), Some(50.0));
    }

    #[test]
    fn test_validity_uses_declared_types() {
        let t = table(
            &["email"],
            vec![vec![json!("a@b.com")], vec![json!("not-an-email")]],
        );
        let rules = QualityRules {
            column_types: BTreeMap::from([("email".to_string(), ColumnType::Email)]),
            ..Default::default()
        };
        let (quality, _) = score(&t, &rules, None);
        assert_eq!(quality.dimension(QualityDimension::Validity), Some(50.0));
    }

    #[test]
    fn test_weighted_score() {
        assert_eq!(weighted_score(vec![(100.0, 900), (0.0, 100)]), Some(90.0));
        assert_eq!(weighted_score(Vec::<(f64, usize)>::new()), None);
    }

    #[test]
    fn test_threshold_overrides() {
        let yaml = "default: 80\ndimensions:\n  timeliness: 50\n";
        let thresholds: QualityThresholds = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(thresholds.for_dimension(QualityDimension::Timeliness), 50.0);
        assert_eq!(thresholds.for_dimension(QualityDimension::Validity), 80.0);
        assert_eq!(thresholds.max_null_rate, 5.0);

        let bad = QualityThresholds {
            default: 120.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
