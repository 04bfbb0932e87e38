use anyhow::{bail, Context, Result};
use catalogue_core::{
    CancellationToken, CatalogueConfig, CatalogueEngine, CatalogueRun, MetadataStore, RunSettings,
    SettingsOverrides,
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "catalogue")]
#[command(about = "Profile tabular data sources and publish a metadata catalogue")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Profile every table and write the catalogue documents
    Run(RunArgs),
    /// Check a configuration file without profiling
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        /// Also resolve lineage against tables discovered here
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory laid out as <layer>/<table>.csv
    #[arg(short, long)]
    pub data_dir: PathBuf,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Output directory (default: catalogue_metadata)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Profiling workers (0 = one per CPU)
    #[arg(short, long)]
    pub threads: Option<usize>,
    /// RFC 3339 timestamp stamped on every document (default: now)
    #[arg(long)]
    pub as_of: Option<String>,
    #[arg(long)]
    pub log_json: bool,
}

impl RunArgs {
    /// Layer the flags over `CATALOGUE_*` environment settings
    pub fn settings(&self) -> Result<RunSettings> {
        let overrides = SettingsOverrides {
            output_dir: self.output.clone(),
            threads: self.threads,
            log_format: self.log_json.then(|| "json".to_string()),
        };
        RunSettings::load(&overrides).context("failed to resolve run settings")
    }
}

fn load_config(path: Option<&Path>) -> Result<CatalogueConfig> {
    match path {
        Some(path) => CatalogueConfig::from_path(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => Ok(CatalogueConfig::default()),
    }
}

fn parse_as_of(value: Option<&str>) -> Result<DateTime<Utc>> {
    match value {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("--as-of '{}' is not an RFC 3339 timestamp", raw))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

/// Returns the process exit code
pub async fn run_command(
    args: RunArgs,
    settings: RunSettings,
    cancel: CancellationToken,
) -> Result<i32> {
    let mut config = load_config(args.config.as_deref())?;
    if settings.threads > 0 {
        config.threads.workers = settings.threads;
    }
    let as_of = parse_as_of(args.as_of.as_deref())?;

    let engine = CatalogueEngine::new(config)?;
    let sources = engine.schedule(Some(args.data_dir.as_path()))?;
    if sources.is_empty() {
        bail!("no tables found under {}", args.data_dir.display());
    }
    info!(
        "Profiling {} tables from {}",
        sources.len(),
        args.data_dir.display()
    );

    // Profiling is CPU-bound; keep it off the async workers
    let run = tokio::task::spawn_blocking(move || engine.run(&sources, &cancel, as_of)).await?;

    let store = MetadataStore::new(&settings.output_dir);
    store.write(&run).with_context(|| {
        format!(
            "failed to write catalogue to {}",
            settings.output_dir.display()
        )
    })?;

    print_report(&run, store.output_dir());
    Ok(run.exit_code())
}

fn print_report(run: &CatalogueRun, output_dir: &Path) {
    let summary = &run.summary;
    println!("Catalogue run {}", summary.run_id);
    println!("==========================================");
    println!(
        "Tables profiled: {}/{}",
        summary.tables_profiled.len(),
        summary.tables_scheduled
    );
    println!("Total rows:      {}", run.master.total_rows);
    println!("Total columns:   {}", run.master.total_columns);
    match run.master.quality_score {
        Some(score) => println!("Quality score:   {:.1}", score),
        None => println!("Quality score:   n/a"),
    }
    println!(
        "DQ tests:        {}/{} passed",
        run.quality_report.tests_passed, run.quality_report.tests_total
    );
    println!("Glossary terms:  {}", run.glossary.len());
    println!("Warnings:        {}", summary.warnings.len());

    for failure in &summary.failures {
        println!("✗ {} [{:?}] {}", failure.table, failure.kind, failure.message);
    }
    if let Err(e) = &run.lineage {
        println!("✗ lineage withheld: {}", e);
    }
    println!("Output: {}", output_dir.display());
}

/// Returns 0 when the configuration and its lineage are sound, 2 when
/// only the lineage is rejected
pub fn validate_command(config: PathBuf, data_dir: Option<PathBuf>) -> Result<i32> {
    let config = load_config(Some(config.as_path()))?;
    let tables = config.tables.len();
    let engine = CatalogueEngine::new(config)?;
    let sources = engine.schedule(data_dir.as_deref())?;

    match engine.validate_lineage(&sources) {
        Ok(map) => {
            println!(
                "✓ configuration valid: {} curated tables, {} known tables, {} lineage edges",
                tables,
                map.nodes.len(),
                map.edges.len()
            );
            Ok(0)
        }
        Err(e) => {
            error!("Lineage configuration rejected: {}", e);
            println!("✗ lineage: {}", e);
            Ok(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_as_of() {
        let parsed = parse_as_of(Some("2024-06-01T12:00:00+02:00")).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T10:00:00+00:00");
        assert!(parse_as_of(Some("yesterday")).is_err());
    }

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::parse_from([
            "catalogue",
            "run",
            "--data-dir",
            "data",
            "--threads",
            "4",
            "--log-json",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.data_dir, PathBuf::from("data"));
                assert_eq!(args.threads, Some(4));
                assert!(args.log_json);
                assert!(args.config.is_none());
            }
            Commands::Validate { .. } => panic!("expected run"),
        }
    }
}
