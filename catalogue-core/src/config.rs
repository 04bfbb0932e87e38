//! Catalogue configuration: curated policy documents and layered run settings

use crate::catalogue::TagRule;
use crate::classifier::{Sensitivity, SensitivityLexicon};
use crate::column_profiler::ProfilingConfig;
use crate::glossary::GlossaryEntry;
use crate::lineage::LineageConfig;
use crate::quality::{QualityRules, QualityThresholds};
use crate::thread_config::ThreadPoolConfig;
use crate::{CatalogueError, Result};
use config as config_rs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_OWNER: &str = "Data Engineering";
pub const UNKNOWN: &str = "Unknown";

/// Curator-maintained metadata for a single table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableMetadata {
    pub layer: Option<String>,
    pub owner: Option<String>,
    pub refresh: Option<String>,
    pub sla: Option<String>,
    /// Numeric SLA used for the timeliness dimension
    pub sla_hours: Option<f64>,
    pub tags: Vec<String>,
    /// Explicit source file; the table is scheduled even when the file is absent
    pub source: Option<PathBuf>,
    pub quality: QualityRules,
}

/// Static configuration for one profiling run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogueConfig {
    pub profiling: ProfilingConfig,
    pub lexicon: SensitivityLexicon,
    /// Curator overrides keyed by `table.column` or bare `column`
    pub overrides: BTreeMap<String, Sensitivity>,
    pub warn_unclassified: bool,
    pub tables: BTreeMap<String, TableMetadata>,
    pub lineage: LineageConfig,
    pub glossary: Vec<GlossaryEntry>,
    pub thresholds: QualityThresholds,
    pub tag_rules: Vec<TagRule>,
    pub threads: ThreadPoolConfig,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            profiling: ProfilingConfig::default(),
            lexicon: SensitivityLexicon::standard(),
            overrides: BTreeMap::new(),
            warn_unclassified: true,
            tables: BTreeMap::new(),
            lineage: LineageConfig::default(),
            glossary: Vec::new(),
            thresholds: QualityThresholds::default(),
            tag_rules: TagRule::standard(),
            threads: ThreadPoolConfig::default(),
        }
    }
}

impl CatalogueConfig {
    /// Load a YAML (or JSON) configuration document. An empty file yields
    /// the defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.profiling.validate()?;
        self.thresholds.validate()?;
        for (table, meta) in &self.tables {
            // Table names become output file names
            if table.is_empty() || table == "." || table == ".." || table.contains(['/', '\\']) {
                return Err(CatalogueError::Configuration(format!(
                    "table name '{}' must be a plain file name",
                    table
                )));
            }
            if let Some(hours) = meta.sla_hours {
                if !(hours > 0.0 && hours.is_finite()) {
                    return Err(CatalogueError::Configuration(format!(
                        "table '{}': slaHours must be positive, got {}",
                        table, hours
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.get(name)
    }
}

/// Operational settings layered from defaults, `CATALOGUE_*` environment
/// variables and command-line flags (highest precedence).
#[derive(Debug, Clone, Deserialize)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub threads: usize,
    pub log_format: String,
}

/// Command-line values that override the environment
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub output_dir: Option<PathBuf>,
    pub threads: Option<usize>,
    pub log_format: Option<String>,
}

impl RunSettings {
    pub fn load(overrides: &SettingsOverrides) -> Result<Self> {
        let builder = config_rs::Config::builder()
            .set_default("output_dir", "catalogue_metadata")?
            .set_default("threads", 0)?
            .set_default("log_format", "plain")?
            .add_source(config_rs::Environment::with_prefix("CATALOGUE").try_parsing(true))
            .set_override_option(
                "output_dir",
                overrides
                    .output_dir
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
            )?
            .set_override_option("threads", overrides.threads.map(|t| t as i64))?
            .set_override_option("log_format", overrides.log_format.clone())?;

        let settings: RunSettings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
