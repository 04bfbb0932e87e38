//! Catalogue: data profiling and metadata catalogue engine

pub mod catalogue;
pub mod classifier;
pub mod column_profiler;
pub mod config;
pub mod data_source;
pub mod errors;
pub mod glossary;
pub mod lineage;
pub mod patterns;
pub mod quality;
pub mod summary;
pub mod thread_config;
pub mod writer;

// Re-exports
pub use catalogue::{MasterCatalogue, QualityReport, TableProfile, TableProfiler, TagRule};
pub use classifier::{Sensitivity, SensitivityClassifier, SensitivityLexicon};
pub use column_profiler::{ColumnProfile, ColumnProfiler, Distribution, ProfilingConfig};
pub use crate::config::{CatalogueConfig, RunSettings, SettingsOverrides, TableMetadata};
pub use data_source::{discover_tables, CellValue, DataSource, DataSourceConfig, Table};
pub use errors::{CatalogueError, LineageConfigError, Result, Warning, WarningKind};
pub use glossary::{GlossaryEntry, GlossaryTerm};
pub use lineage::{LineageConfig, LineageMap};
pub use patterns::ColumnType;
pub use quality::{QualityDimension, QualityThresholds};
pub use summary::{FailureKind, LineageOutcome, RunOutcome, RunSummary, TableFailure};
pub use writer::MetadataStore;

use crate::catalogue::ProfiledTable;
use crate::config::UNKNOWN;
use crate::glossary::GlossaryIndex;
use crate::quality::QualityScorer;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Coarse cancellation: tables not yet started are skipped, tables already
/// profiling run to completion
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Everything one run produced, ready for the metadata store
#[derive(Debug, Clone)]
pub struct CatalogueRun {
    /// Successfully profiled tables, sorted by name
    pub profiles: Vec<TableProfile>,
    pub master: MasterCatalogue,
    pub quality_report: QualityReport,
    pub lineage: std::result::Result<LineageMap, LineageConfigError>,
    pub glossary: Vec<GlossaryTerm>,
    pub summary: RunSummary,
}

impl CatalogueRun {
    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code
    }

    pub fn profile(&self, table: &str) -> Option<&TableProfile> {
        self.profiles.iter().find(|p| p.table_name == table)
    }
}

enum TableOutcome {
    Profiled(Box<ProfiledTable>),
    Failed(TableFailure),
}

/// Main catalogue engine interface
pub struct CatalogueEngine {
    config: CatalogueConfig,
    columns: ColumnProfiler,
    classifier: SensitivityClassifier,
    scorer: QualityScorer,
    glossary: GlossaryIndex,
    pool: rayon::ThreadPool,
}

impl CatalogueEngine {
    /// Validate the configuration and compile the lexicon
    pub fn new(config: CatalogueConfig) -> Result<Self> {
        config.validate()?;
        let classifier = SensitivityClassifier::new(
            &config.lexicon,
            config.overrides.clone(),
            config.warn_unclassified,
        )?;
        let pool = thread_config::build_pool(&config.threads)?;

        Ok(Self {
            columns: ColumnProfiler::new(config.profiling.clone()),
            classifier,
            scorer: QualityScorer::new(config.thresholds.clone()),
            glossary: GlossaryIndex::new(&config.glossary),
            pool,
            config,
        })
    }

    pub fn config(&self) -> &CatalogueConfig {
        &self.config
    }

    /// Tables discovered under `data_dir` plus every table whose metadata
    /// names an explicit source file. Explicit sources are scheduled even
    /// when the file does not exist, so the run reports them as failed.
    pub fn schedule(&self, data_dir: Option<&Path>) -> Result<Vec<DataSource>> {
        let mut sources = match data_dir {
            Some(dir) => discover_tables(dir)?,
            None => Vec::new(),
        };

        for (name, metadata) in &self.config.tables {
            let Some(path) = &metadata.source else {
                continue;
            };
            let path = match data_dir {
                Some(dir) if path.is_relative() => dir.join(path),
                _ => path.clone(),
            };
            let explicit = DataSource::csv(name.as_str(), path);
            match sources.iter_mut().find(|s| s.name() == name) {
                Some(existing) => *existing = explicit,
                None => sources.push(explicit),
            }
        }

        sources.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(sources)
    }

    /// Profile every source, then build the glossary and lineage from the
    /// completed profile set
    pub fn run(
        &self,
        sources: &[DataSource],
        cancel: &CancellationToken,
        as_of: DateTime<Utc>,
    ) -> CatalogueRun {
        let started_at = Utc::now();
        info!(
            "Starting catalogue run: {} tables on {} workers",
            sources.len(),
            self.pool.current_num_threads()
        );

        let profiler = TableProfiler {
            columns: &self.columns,
            classifier: &self.classifier,
            scorer: &self.scorer,
            glossary: &self.glossary,
            tag_rules: &self.config.tag_rules,
            as_of,
        };

        // Workers share nothing mutable; the collect is the only join point
        let outcomes: Vec<TableOutcome> = self.pool.install(|| {
            sources
                .par_iter()
                .map(|source| self.profile_source(&profiler, source, cancel))
                .collect()
        });

        let mut profiles = Vec::new();
        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        for outcome in outcomes {
            match outcome {
                TableOutcome::Profiled(table) => {
                    let ProfiledTable {
                        profile,
                        warnings: table_warnings,
                    } = *table;
                    warnings.extend(table_warnings);
                    profiles.push(profile);
                }
                TableOutcome::Failed(failure) => failures.push(failure),
            }
        }
        profiles.sort_by(|a, b| a.table_name.cmp(&b.table_name));

        let (glossary, glossary_warnings) = glossary::extract_glossary(
            &self.config.glossary,
            profiles
                .iter()
                .map(|p| (p.table_name.as_str(), p.columns.as_slice())),
        );
        warnings.extend(glossary_warnings);

        let lineage = lineage::build_lineage(
            profiles
                .iter()
                .map(|p| (p.table_name.as_str(), p.layer.as_str())),
            &self.config.lineage,
        );
        let lineage_outcome = match &lineage {
            Ok(map) => LineageOutcome::Written {
                nodes: map.nodes.len(),
                edges: map.edges.len(),
            },
            Err(e) => {
                error!("Lineage withheld: {}", e);
                LineageOutcome::withheld(e)
            }
        };

        for warning in &warnings {
            warn!("{}", warning);
        }

        let master = MasterCatalogue::build(&profiles, as_of);
        let quality_report = QualityReport::build(&profiles, as_of);
        let summary = RunSummary::new(RunOutcome {
            started_at,
            as_of,
            tables_scheduled: sources.len(),
            tables_profiled: profiles.iter().map(|p| p.table_name.clone()).collect(),
            failures,
            warnings,
            lineage: lineage_outcome,
            glossary_terms: glossary.len(),
        });

        info!(
            "Catalogue run complete: {} profiled, {} failed, {} warnings, exit code {}",
            summary.tables_profiled.len(),
            summary.failures.len(),
            summary.warnings.len(),
            summary.exit_code
        );

        CatalogueRun {
            profiles,
            master,
            quality_report,
            lineage,
            glossary,
            summary,
        }
    }

    fn profile_source(
        &self,
        profiler: &TableProfiler<'_>,
        source: &DataSource,
        cancel: &CancellationToken,
    ) -> TableOutcome {
        let name = source.name();
        if cancel.is_cancelled() {
            return TableOutcome::Failed(TableFailure {
                table: name.to_string(),
                kind: FailureKind::Cancelled,
                message: "cancellation requested before profiling started".to_string(),
            });
        }

        let table = match source.load() {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping table {}: {}", name, e);
                return TableOutcome::Failed(TableFailure {
                    table: name.to_string(),
                    kind: FailureKind::SourceReadError,
                    message: e.to_string(),
                });
            }
        };

        let metadata = self.config.table(name);
        let layer = self.layer_for(name, source.layer());

        info!("Profiling {} ({})", name, layer);
        TableOutcome::Profiled(Box::new(profiler.profile(&table, layer, metadata)))
    }

    /// Check lineage against the declared and discovered tables without
    /// profiling anything. Returns the lineage map that would be built.
    pub fn validate_lineage<'a>(
        &'a self,
        sources: &'a [DataSource],
    ) -> std::result::Result<LineageMap, LineageConfigError> {
        let mut tables: BTreeMap<&str, &str> = BTreeMap::new();
        for name in self.config.tables.keys() {
            tables.insert(name, self.layer_for(name, None));
        }
        for source in sources {
            tables.insert(source.name(), self.layer_for(source.name(), source.layer()));
        }
        lineage::build_lineage(tables, &self.config.lineage)
    }

    /// Curated layer, else the discovered one
    fn layer_for<'a>(&'a self, table: &str, discovered: Option<&'a str>) -> &'a str {
        self.config
            .table(table)
            .and_then(|m| m.layer.as_deref())
            .or(discovered)
            .unwrap_or(UNKNOWN)
    }
}
