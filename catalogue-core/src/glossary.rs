//! Business glossary cross-referencing against profiled columns

use crate::classifier::Sensitivity;
use crate::column_profiler::ColumnProfile;
use crate::errors::{Warning, WarningKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Curator-authored glossary entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlossaryEntry {
    pub term: String,
    /// Exact column name the term describes
    pub column: String,
    pub domain: String,
    pub definition: String,
    pub steward: String,
}

/// Exported glossary term with the computed table cross-reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryTerm {
    pub term: String,
    pub column: String,
    pub domain: String,
    pub definition: String,
    pub steward: String,
    pub tables: Vec<String>,
    pub sensitivity: Option<Sensitivity>,
}

/// Column name to glossary term lookup used while profiling
#[derive(Debug, Clone, Default)]
pub struct GlossaryIndex {
    by_column: HashMap<String, String>,
}

impl GlossaryIndex {
    /// The first entry declared for a column wins
    pub fn new(entries: &[GlossaryEntry]) -> Self {
        let mut by_column = HashMap::with_capacity(entries.len());
        for entry in entries {
            by_column
                .entry(entry.column.clone())
                .or_insert_with(|| entry.term.clone());
        }
        Self { by_column }
    }

    pub fn term_for(&self, column: &str) -> Option<&str> {
        self.by_column.get(column).map(String::as_str)
    }
}

/// Resolve every entry against the profiled tables. Entries matching no
/// table are kept with an empty `tables` list and reported.
pub fn extract_glossary<'a, I>(
    entries: &[GlossaryEntry],
    tables: I,
) -> (Vec<GlossaryTerm>, Vec<Warning>)
where
    I: IntoIterator<Item = (&'a str, &'a [ColumnProfile])>,
{
    let mut tables: Vec<(&str, &[ColumnProfile])> = tables.into_iter().collect();
    tables.sort_by(|a, b| a.0.cmp(b.0));

    let mut warnings = Vec::new();
    let mut terms: Vec<GlossaryTerm> = entries
        .iter()
        .map(|entry| {
            let mut found: BTreeSet<&str> = BTreeSet::new();
            let mut sensitivity = None;
            for (table, columns) in &tables {
                if let Some(column) = columns.iter().find(|c| c.name == entry.column) {
                    found.insert(*table);
                    sensitivity.get_or_insert(column.sensitivity);
                }
            }

            if found.is_empty() {
                warnings.push(Warning::new(
                    WarningKind::GlossaryWarning,
                    format!(
                        "glossary term '{}' references column '{}' which no profiled table contains",
                        entry.term, entry.column
                    ),
                ));
            }

            GlossaryTerm {
                term: entry.term.clone(),
                column: entry.column.clone(),
                domain: entry.domain.clone(),
                definition: entry.definition.clone(),
                steward: entry.steward.clone(),
                tables: found.into_iter().map(str::to_string).collect(),
                sensitivity,
            }
        })
        .collect();

    terms.sort_by(|a, b| a.term.cmp(&b.term).then_with(|| a.column.cmp(&b.column)));
    (terms, warnings)
}
