//! Per-column statistics, type inference and distribution summaries

use crate::classifier::Sensitivity;
use crate::data_source::CellValue;
use crate::errors::{Warning, WarningKind};
use crate::patterns::{parse_number, ColumnType};
use crate::{CatalogueError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const MASKED: &str = "***MASKED***";
const SAMPLE_VALUES: usize = 5;
const MASKED_SAMPLES: usize = 3;

/// Thresholds that decide inference and distribution shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfilingConfig {
    /// Columns with `distinct / rows` below this ratio may be categorical
    pub categorical_ratio: f64,
    pub categorical_max_distinct: usize,
    /// Number of categories kept in a categorical distribution
    pub top_values: usize,
    /// Non-null values examined during type inference
    pub type_sample_size: usize,
    pub identifier_min_uniqueness: f64,
    pub identifier_min_length: usize,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            categorical_ratio: 0.05,
            categorical_max_distinct: 20,
            top_values: 8,
            type_sample_size: 100,
            identifier_min_uniqueness: 0.9,
            identifier_min_length: 4,
        }
    }
}

impl ProfilingConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = |v: f64| v > 0.0 && v <= 1.0;
        if !unit(self.categorical_ratio) {
            return Err(CatalogueError::Configuration(format!(
                "categoricalRatio must be in (0, 1], got {}",
                self.categorical_ratio
            )));
        }
        if !unit(self.identifier_min_uniqueness) {
            return Err(CatalogueError::Configuration(format!(
                "identifierMinUniqueness must be in (0, 1], got {}",
                self.identifier_min_uniqueness
            )));
        }
        if self.top_values == 0 || self.type_sample_size == 0 {
            return Err(CatalogueError::Configuration(
                "topValues and typeSampleSize must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopValue {
    pub value: String,
    pub count: usize,
    /// Share of non-null values, rounded to a whole percent
    pub pct: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Distribution {
    #[serde(rename_all = "camelCase")]
    Categorical { top_values: Vec<TopValue> },
    #[serde(rename_all = "camelCase")]
    Numeric {
        min: f64,
        max: f64,
        mean: f64,
        median: f64,
        std_dev: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LengthStats {
    pub min_length: usize,
    pub max_length: usize,
    pub avg_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub sensitivity: Sensitivity,
    pub total_count: usize,
    pub null_count: usize,
    pub null_rate: f64,
    pub distinct: usize,
    pub cardinality_ratio: f64,
    pub unique: bool,
    pub valid_rate: f64,
    pub quality_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_stats: Option<LengthStats>,
    pub sample_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glossary_ref: Option<String>,
}

impl ColumnProfile {
    /// Record the sensitivity class; personal data samples are masked.
    pub fn set_sensitivity(&mut self, sensitivity: Sensitivity) {
        self.sensitivity = sensitivity;
        if sensitivity.is_personal() {
            let shown = self.sample_values.len().min(MASKED_SAMPLES);
            self.sample_values = vec![MASKED.to_string(); shown];
        }
    }

    pub fn is_empty(&self) -> bool {
        self.null_count == self.total_count
    }
}

/// A profile plus the raw material later stages need
#[derive(Debug, Clone)]
pub struct ProfiledColumn {
    pub profile: ColumnProfile,
    /// Non-null values examined by inference, reused for value-pattern classification
    pub sample: Vec<String>,
    pub warnings: Vec<Warning>,
}

pub struct ColumnProfiler {
    config: ProfilingConfig,
}

impl ColumnProfiler {
    pub fn new(config: ProfilingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProfilingConfig {
        &self.config
    }

    pub fn profile<'a, I>(&self, table: &str, name: &str, values: I) -> ProfiledColumn
    where
        I: IntoIterator<Item = &'a CellValue>,
    {
        let rendered: Vec<Option<std::borrow::Cow<'a, str>>> =
            values.into_iter().map(CellValue::render).collect();
        let total = rendered.len();
        let non_null: Vec<&str> = rendered.iter().filter_map(|r| r.as_deref()).collect();
        let null_count = total - non_null.len();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut sample_values = Vec::new();
        for &value in &non_null {
            let count = counts.entry(value).or_insert(0);
            if *count == 0 && sample_values.len() < SAMPLE_VALUES {
                sample_values.push(value.to_string());
            }
            *count += 1;
        }
        let distinct = counts.len();

        let mut warnings = Vec::new();
        let column_type = self.infer_type(&non_null, distinct, &mut warnings);
        let invalid = non_null
            .iter()
            .filter(|v| !column_type.conforms(v))
            .count();

        let distribution = self.distribution(&non_null, &counts, total, column_type);
        let length_stats = if column_type.is_textual() {
            length_stats(&non_null)
        } else {
            None
        };

        let quality_score = if non_null.is_empty() {
            warnings.push(
                Warning::new(WarningKind::EmptyColumn, "column contains only nulls; flagged for review")
                    .for_table(table)
                    .for_column(name),
            );
            0.0
        } else {
            let null_frac = null_count as f64 / total as f64;
            let invalid_frac = invalid as f64 / non_null.len() as f64;
            round1(100.0 - (null_frac * 50.0).min(25.0) - (invalid_frac * 50.0).min(25.0))
        };

        for warning in warnings.iter_mut() {
            if warning.table.is_none() {
                warning.table = Some(table.to_string());
                warning.column = Some(name.to_string());
            }
        }

        debug!(
            "Profiled {}.{}: type={}, distinct={}, nulls={}",
            table, name, column_type, distinct, null_count
        );

        let sample_len = non_null.len().min(self.config.type_sample_size);
        let profile = ColumnProfile {
            name: name.to_string(),
            column_type,
            sensitivity: Sensitivity::Public,
            total_count: total,
            null_count,
            null_rate: if total == 0 {
                100.0
            } else {
                round1(null_count as f64 / total as f64 * 100.0)
            },
            distinct,
            cardinality_ratio: if total == 0 {
                0.0
            } else {
                round2(distinct as f64 / total as f64 * 100.0)
            },
            unique: total > 0 && null_count == 0 && distinct == total,
            valid_rate: if non_null.is_empty() {
                0.0
            } else {
                round1((non_null.len() - invalid) as f64 / non_null.len() as f64 * 100.0)
            },
            quality_score,
            distribution,
            length_stats,
            sample_values,
            glossary_ref: None,
        };

        ProfiledColumn {
            profile,
            sample: non_null[..sample_len].iter().map(|v| v.to_string()).collect(),
            warnings,
        }
    }

    /// Try the value recognizers in priority order over a sample. Every
    /// sampled value must conform for a type to be chosen.
    pub fn infer_type(
        &self,
        non_null: &[&str],
        distinct: usize,
        warnings: &mut Vec<Warning>,
    ) -> ColumnType {
        if non_null.is_empty() {
            return ColumnType::String;
        }
        let sample = &non_null[..non_null.len().min(self.config.type_sample_size)];

        let mut best: Option<(ColumnType, usize)> = None;
        for candidate in ColumnType::inference_order() {
            let hits = sample.iter().filter(|v| candidate.conforms(v)).count();
            if hits == sample.len() {
                return candidate;
            }
            if best.map_or(true, |(_, b)| hits > b) {
                best = Some((candidate, hits));
            }
        }

        if self.is_identifier_like(non_null, distinct) {
            return ColumnType::Identifier;
        }

        if let Some((candidate, hits)) = best {
            if hits * 2 > sample.len() {
                warnings.push(Warning::new(
                    WarningKind::TypeInferenceWarning,
                    format!(
                        "{} of {} sampled values look like {}; defaulting to string",
                        hits,
                        sample.len(),
                        candidate
                    ),
                ));
            }
        }
        ColumnType::String
    }

    fn is_identifier_like(&self, non_null: &[&str], distinct: usize) -> bool {
        let Some(first) = non_null.first() else {
            return false;
        };
        let len = first.chars().count();
        len >= self.config.identifier_min_length
            && distinct as f64 / non_null.len() as f64 >= self.config.identifier_min_uniqueness
            && non_null
                .iter()
                .all(|v| v.chars().count() == len && ColumnType::Identifier.conforms(v))
    }

    fn distribution(
        &self,
        non_null: &[&str],
        counts: &HashMap<&str, usize>,
        total: usize,
        column_type: ColumnType,
    ) -> Option<Distribution> {
        let distinct = counts.len();
        let categorical = total > 0
            && distinct > 0
            && (distinct as f64 / total as f64) < self.config.categorical_ratio
            && distinct <= self.config.categorical_max_distinct;

        if categorical {
            let mut entries: Vec<(&str, usize)> = counts.iter().map(|(v, c)| (*v, *c)).collect();
            entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            let denominator = non_null.len() as f64;
            let top_values = entries
                .into_iter()
                .take(self.config.top_values)
                .map(|(value, count)| TopValue {
                    value: value.to_string(),
                    count,
                    pct: (count as f64 / denominator * 100.0).round() as u32,
                })
                .collect();
            return Some(Distribution::Categorical { top_values });
        }

        if column_type.is_numeric() {
            let mut nums: Vec<f64> = non_null.iter().filter_map(|v| parse_number(v)).collect();
            if nums.is_empty() {
                return None;
            }
            nums.sort_by(|a, b| a.total_cmp(b));
            let n = nums.len() as f64;
            let mean = nums.iter().sum::<f64>() / n;
            let variance = nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            return Some(Distribution::Numeric {
                min: nums[0],
                max: nums[nums.len() - 1],
                mean: round2(mean),
                median: nums[nums.len() / 2],
                std_dev: round2(variance.sqrt()),
            });
        }

        None
    }
}

fn length_stats(non_null: &[&str]) -> Option<LengthStats> {
    let lengths: Vec<usize> = non_null.iter().map(|v| v.chars().count()).collect();
    let min_length = *lengths.iter().min()?;
    let max_length = *lengths.iter().max()?;
    let avg = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
    Some(LengthStats {
        min_length,
        max_length,
        avg_length: round1(avg),
    })
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
