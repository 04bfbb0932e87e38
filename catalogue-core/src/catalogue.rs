//! Table profiles and the catalogue-wide aggregate documents

use crate::classifier::{Sensitivity, SensitivityClassifier};
use crate::column_profiler::{round1, ColumnProfile, ColumnProfiler};
use crate::config::{TableMetadata, DEFAULT_OWNER, UNKNOWN};
use crate::data_source::Table;
use crate::errors::Warning;
use crate::glossary::GlossaryIndex;
use crate::quality::{
    weighted_score, QualityDimension, QualityScorer, ScoringContext, TableQuality,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const CONTAINS_PII: &str = "contains_pii";

/// Keyword tagging: a table whose name contains (or starts with) the
/// keyword receives `tags`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagRule {
    pub contains: Option<String>,
    pub prefix: Option<String>,
    pub tags: Vec<String>,
}

impl TagRule {
    fn contains(keyword: &str, tags: &[&str]) -> Self {
        Self {
            contains: Some(keyword.to_string()),
            prefix: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn prefix(prefix: &str, tags: &[&str]) -> Self {
        Self {
            contains: None,
            prefix: Some(prefix.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn standard() -> Vec<TagRule> {
        vec![
            TagRule::contains("customer", &["customer", "entity"]),
            TagRule::contains("transaction", &["financial", "transactional"]),
            TagRule::contains("payment", &["financial", "transactional"]),
            TagRule::contains("fraud", &["fraud", "compliance", "aml"]),
            TagRule::contains("risk", &["risk", "regulatory"]),
            TagRule::prefix("dim_", &["dimension"]),
            TagRule::prefix("fact_", &["fact"]),
            TagRule::contains("partner", &["partnership"]),
            TagRule::contains("digital", &["digital"]),
            TagRule::contains("click", &["digital"]),
            TagRule::contains("mdm", &["mdm", "data_quality"]),
            TagRule::contains("match", &["mdm", "data_quality"]),
        ]
    }

    /// A rule with neither condition never matches
    pub fn matches(&self, table: &str) -> bool {
        let contains = self.contains.as_deref().map(|k| table.contains(k));
        let prefix = self.prefix.as_deref().map(|p| table.starts_with(p));
        match (contains, prefix) {
            (None, None) => false,
            (c, p) => c.unwrap_or(true) && p.unwrap_or(true),
        }
    }
}

/// `1.5 KB` below one megabyte, `2.3 MB` above
pub fn human_size(bytes: u64) -> String {
    if bytes < 1_048_576 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    }
}

fn empty_sensitivity_counts() -> BTreeMap<Sensitivity, usize> {
    Sensitivity::all().into_iter().map(|s| (s, 0)).collect()
}

/// Per-table profile document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableProfile {
    pub table_name: String,
    pub layer: String,
    pub rows: usize,
    pub cols: usize,
    pub size_estimate: u64,
    pub size_human: String,
    pub owner: String,
    pub refresh: String,
    pub sla: String,
    pub tags: Vec<String>,
    pub quality_score: f64,
    pub sensitivity_counts: BTreeMap<Sensitivity, usize>,
    pub profiled_at: DateTime<Utc>,
    pub quality: TableQuality,
    pub columns: Vec<ColumnProfile>,
}

/// Row of the master catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub name: String,
    pub layer: String,
    pub rows: usize,
    pub cols: usize,
    pub size_estimate: u64,
    pub size_human: String,
    pub quality_score: f64,
    pub sensitivity_counts: BTreeMap<Sensitivity, usize>,
    pub tags: Vec<String>,
    pub owner: String,
    pub refresh: String,
    pub sla: String,
}

impl TableProfile {
    pub fn summary(&self) -> TableSummary {
        TableSummary {
            name: self.table_name.clone(),
            layer: self.layer.clone(),
            rows: self.rows,
            cols: self.cols,
            size_estimate: self.size_estimate,
            size_human: self.size_human.clone(),
            quality_score: self.quality_score,
            sensitivity_counts: self.sensitivity_counts.clone(),
            tags: self.tags.clone(),
            owner: self.owner.clone(),
            refresh: self.refresh.clone(),
            sla: self.sla.clone(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct ProfiledTable {
    pub profile: TableProfile,
    pub warnings: Vec<Warning>,
}

/// Runs the per-column stages and the quality scorer over one table
pub struct TableProfiler<'a> {
    pub columns: &'a ColumnProfiler,
    pub classifier: &'a SensitivityClassifier,
    pub scorer: &'a QualityScorer,
    pub glossary: &'a GlossaryIndex,
    pub tag_rules: &'a [TagRule],
    pub as_of: DateTime<Utc>,
}

impl TableProfiler<'_> {
    pub fn profile(
        &self,
        table: &Table,
        layer: &str,
        metadata: Option<&TableMetadata>,
    ) -> ProfiledTable {
        let default_metadata = TableMetadata::default();
        let metadata = metadata.unwrap_or(&default_metadata);

        let mut warnings = Vec::new();
        let mut columns = Vec::with_capacity(table.columns.len());
        for (idx, name) in table.columns.iter().enumerate() {
            let profiled = self
                .columns
                .profile(&table.name, name, table.column_values(idx));
            let mut profile = profiled.profile;
            warnings.extend(profiled.warnings);

            let classification =
                self.classifier
                    .classify(&table.name, name, profile.column_type, &profiled.sample);
            profile.set_sensitivity(classification.sensitivity);
            warnings.extend(classification.warning);

            profile.glossary_ref = self.glossary.term_for(name).map(str::to_string);
            columns.push(profile);
        }

        let (quality, breaches) = self.scorer.score(
            table,
            &columns,
            ScoringContext {
                rules: &metadata.quality,
                sla_hours: metadata.sla_hours,
                as_of: self.as_of,
            },
        );
        warnings.extend(breaches);

        let mut sensitivity_counts = empty_sensitivity_counts();
        for column in &columns {
            *sensitivity_counts.entry(column.sensitivity).or_insert(0) += 1;
        }

        let mut tags: BTreeSet<String> = metadata.tags.iter().cloned().collect();
        tags.insert(layer.to_string());
        if columns.iter().any(|c| c.sensitivity.is_personal()) {
            tags.insert(CONTAINS_PII.to_string());
        }
        for rule in self.tag_rules.iter().filter(|r| r.matches(&table.name)) {
            tags.extend(rule.tags.iter().cloned());
        }

        debug!(
            "Profiled table {} ({} rows, {} columns): quality {:.1}",
            table.name,
            table.row_count(),
            columns.len(),
            quality.score
        );

        let profile = TableProfile {
            table_name: table.name.clone(),
            layer: layer.to_string(),
            rows: table.row_count(),
            cols: columns.len(),
            size_estimate: table.size_bytes,
            size_human: human_size(table.size_bytes),
            owner: metadata
                .owner
                .clone()
                .unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            refresh: metadata
                .refresh
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            sla: metadata.sla.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            tags: tags.into_iter().collect(),
            quality_score: quality.score,
            sensitivity_counts,
            profiled_at: self.as_of,
            quality,
            columns,
        };

        ProfiledTable { profile, warnings }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStats {
    pub tables: usize,
    pub rows: usize,
    pub avg_quality: f64,
}

fn layer_statistics(profiles: &[TableProfile]) -> BTreeMap<String, LayerStats> {
    let mut by_layer: BTreeMap<String, Vec<&TableProfile>> = BTreeMap::new();
    for profile in profiles {
        by_layer
            .entry(profile.layer.clone())
            .or_default()
            .push(profile);
    }
    by_layer
        .into_iter()
        .map(|(layer, tables)| {
            let avg = tables.iter().map(|t| t.quality_score).sum::<f64>() / tables.len() as f64;
            let stats = LayerStats {
                tables: tables.len(),
                rows: tables.iter().map(|t| t.rows).sum(),
                avg_quality: round1(avg),
            };
            (layer, stats)
        })
        .collect()
}

/// Catalogue-wide summary of every successfully profiled table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterCatalogue {
    pub generated_at: DateTime<Utc>,
    pub total_tables: usize,
    pub total_rows: usize,
    pub total_columns: usize,
    pub total_size_bytes: u64,
    pub total_size_human: String,
    pub quality_score: Option<f64>,
    pub sensitivity_counts: BTreeMap<Sensitivity, usize>,
    pub layer_statistics: BTreeMap<String, LayerStats>,
    pub tables: Vec<TableSummary>,
}

impl MasterCatalogue {
    pub fn build(profiles: &[TableProfile], generated_at: DateTime<Utc>) -> Self {
        let mut sensitivity_counts = empty_sensitivity_counts();
        for profile in profiles {
            for (class, count) in &profile.sensitivity_counts {
                *sensitivity_counts.entry(*class).or_insert(0) += count;
            }
        }

        let total_size_bytes = profiles.iter().map(|p| p.size_estimate).sum();
        let mut tables: Vec<TableSummary> = profiles.iter().map(TableProfile::summary).collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            generated_at,
            total_tables: profiles.len(),
            total_rows: profiles.iter().map(|p| p.rows).sum(),
            total_columns: profiles.iter().map(|p| p.cols).sum(),
            total_size_bytes,
            total_size_human: human_size(total_size_bytes),
            quality_score: weighted_score(profiles.iter().map(|p| (p.quality_score, p.rows))),
            sensitivity_counts,
            layer_statistics: layer_statistics(profiles),
            tables,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionAggregate {
    pub dimension: QualityDimension,
    /// Row-weighted over the tables where the dimension applies
    pub score: Option<f64>,
    pub tests_passed: usize,
    pub tests_total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedTable {
    pub table: String,
    pub score: f64,
    pub layer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub report_date: DateTime<Utc>,
    pub overall_score: Option<f64>,
    pub dimension_scores: Vec<DimensionAggregate>,
    pub tests_passed: usize,
    pub tests_total: usize,
    pub pass_rate: f64,
    pub per_table_scores: BTreeMap<String, f64>,
    pub layer_statistics: BTreeMap<String, LayerStats>,
    /// Ascending by score, worst first
    pub tables_by_quality: Vec<RankedTable>,
}

impl QualityReport {
    pub fn build(profiles: &[TableProfile], report_date: DateTime<Utc>) -> Self {
        let dimension_scores = QualityDimension::all()
            .into_iter()
            .map(|dimension| {
                let mut passed = 0;
                let mut total = 0;
                let mut applicable = Vec::new();
                for profile in profiles {
                    if let Some(d) = profile
                        .quality
                        .dimensions
                        .iter()
                        .find(|d| d.dimension == dimension)
                    {
                        passed += d.tests_passed;
                        total += d.tests_total;
                        if let Some(score) = d.score {
                            applicable.push((score, profile.rows));
                        }
                    }
                }
                DimensionAggregate {
                    dimension,
                    score: weighted_score(applicable),
                    tests_passed: passed,
                    tests_total: total,
                }
            })
            .collect();

        let tests_passed: usize = profiles.iter().map(|p| p.quality.tests_passed).sum();
        let tests_total: usize = profiles.iter().map(|p| p.quality.tests_total).sum();

        let mut tables_by_quality: Vec<RankedTable> = profiles
            .iter()
            .map(|p| RankedTable {
                table: p.table_name.clone(),
                score: p.quality_score,
                layer: p.layer.clone(),
            })
            .collect();
        tables_by_quality.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| a.table.cmp(&b.table))
        });

        Self {
            report_date,
            overall_score: weighted_score(profiles.iter().map(|p| (p.quality_score, p.rows))),
            dimension_scores,
            tests_passed,
            tests_total,
            pass_rate: if tests_total == 0 {
                100.0
            } else {
                round1(tests_passed as f64 / tests_total as f64 * 100.0)
            },
            per_table_scores: profiles
                .iter()
                .map(|p| (p.table_name.clone(), p.quality_score))
                .collect(),
            layer_statistics: layer_statistics(profiles),
            tables_by_quality,
        }
    }
}
