//! Metadata store: persists the catalogue documents of one run

use crate::{CatalogueRun, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MASTER_CATALOGUE: &str = "master_catalogue.json";
pub const QUALITY_REPORT: &str = "quality_report.json";
pub const LINEAGE_MAP: &str = "lineage_map.json";
pub const BUSINESS_GLOSSARY: &str = "business_glossary.json";
pub const RUN_SUMMARY: &str = "run_summary.json";

pub fn profile_file_name(table: &str) -> String {
    format!("{}_profile.json", table)
}

/// Single writer over an output directory. Every document is replaced
/// wholesale; nothing is merged with a previous run.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    output_dir: PathBuf,
}

impl MetadataStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every document of `run`, returning the paths written
    pub fn write(&self, run: &CatalogueRun) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)?;
        let mut written = Vec::new();

        for profile in &run.profiles {
            let file_name = profile_file_name(&profile.table_name);
            written.push(self.write_document(&file_name, profile)?);
        }
        for failure in &run.summary.failures {
            self.remove_document(&profile_file_name(&failure.table))?;
        }

        written.push(self.write_document(MASTER_CATALOGUE, &run.master)?);
        written.push(self.write_document(QUALITY_REPORT, &run.quality_report)?);
        written.push(self.write_document(BUSINESS_GLOSSARY, &run.glossary)?);

        match &run.lineage {
            Ok(map) => written.push(self.write_document(LINEAGE_MAP, map)?),
            Err(_) => {
                if self.remove_document(LINEAGE_MAP)? {
                    info!("Removed stale {}", LINEAGE_MAP);
                }
            }
        }

        written.push(self.write_document(RUN_SUMMARY, &run.summary)?);

        info!(
            "Wrote {} catalogue documents to {}",
            written.len(),
            self.output_dir.display()
        );
        Ok(written)
    }

    /// Pretty JSON through a temporary sibling file and a rename, so readers
    /// never observe a half-written document
    pub fn write_document<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        document: &T,
    ) -> Result<PathBuf> {
        let target = self.output_dir.join(file_name);
        let temp = self.output_dir.join(format!(".{}.tmp", file_name));

        let mut bytes = serde_json::to_vec_pretty(document)?;
        bytes.push(b'\n');

        let mut file = fs::File::create(&temp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, &target)?;

        debug!("Wrote {}", target.display());
        Ok(target)
    }

    fn remove_document(&self, file_name: &str) -> Result<bool> {
        let path = self.output_dir.join(file_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
