//! Error and warning types for the catalogue engine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogueError>;

#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Source read error for table '{table}': {reason}")]
    SourceRead { table: String, reason: String },

    #[error("Lineage configuration error: {0}")]
    LineageConfig(#[from] LineageConfigError),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<config::ConfigError> for CatalogueError {
    fn from(err: config::ConfigError) -> Self {
        CatalogueError::Configuration(err.to_string())
    }
}

impl From<regex::Error> for CatalogueError {
    fn from(err: regex::Error) -> Self {
        CatalogueError::InvalidPattern(err.to_string())
    }
}

impl CatalogueError {
    pub fn source_read(table: impl Into<String>, reason: impl Into<String>) -> Self {
        CatalogueError::SourceRead {
            table: table.into(),
            reason: reason.into(),
        }
    }
}

/// Reasons the lineage document is withheld.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineageConfigError {
    #[error("edge {from} -> {to} references unknown node '{missing}'")]
    DanglingEdge {
        from: String,
        to: String,
        missing: String,
    },

    #[error("edge {from} -> {to} closes a cycle")]
    Cycle { from: String, to: String },

    #[error("node '{0}' is declared more than once")]
    DuplicateNode(String),
}

/// Non-fatal conditions surfaced in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WarningKind {
    TypeInferenceWarning,
    ClassificationWarning,
    GlossaryWarning,
    QualityThresholdBreach,
    EmptyColumn,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WarningKind::TypeInferenceWarning => "TypeInferenceWarning",
            WarningKind::ClassificationWarning => "ClassificationWarning",
            WarningKind::GlossaryWarning => "GlossaryWarning",
            WarningKind::QualityThresholdBreach => "QualityThresholdBreach",
            WarningKind::EmptyColumn => "EmptyColumn",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn for_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn for_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        match (&self.table, &self.column) {
            (Some(t), Some(c)) => write!(f, " {}.{}:", t, c)?,
            (Some(t), None) => write!(f, " {}:", t)?,
            (None, Some(c)) => write!(f, " {}:", c)?,
            (None, None) => {}
        }
        write!(f, " {}", self.message)
    }
}
