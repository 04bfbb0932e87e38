//! Lexicon-driven sensitivity classification

use crate::errors::{Warning, WarningKind};
use crate::patterns::ColumnType;
use crate::{CatalogueError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Sensitivity class assigned to every column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sensitivity {
    #[serde(rename = "PII")]
    Pii,
    #[serde(rename = "SPII")]
    Spii,
    #[serde(rename = "CONFIDENTIAL")]
    Confidential,
    #[serde(rename = "PUBLIC")]
    Public,
}

impl Sensitivity {
    pub fn all() -> [Sensitivity; 4] {
        [
            Sensitivity::Pii,
            Sensitivity::Spii,
            Sensitivity::Confidential,
            Sensitivity::Public,
        ]
    }

    /// PII and SPII carry personal data and are masked in samples.
    pub fn is_personal(self) -> bool {
        matches!(self, Sensitivity::Pii | Sensitivity::Spii)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sensitivity::Pii => "PII",
            Sensitivity::Spii => "SPII",
            Sensitivity::Confidential => "CONFIDENTIAL",
            Sensitivity::Public => "PUBLIC",
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lexicon entry. Any populated field can produce a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexiconRule {
    pub class: Sensitivity,
    /// Exact column names
    #[serde(default)]
    pub columns: Vec<String>,
    /// Case-insensitive regexes over the column name
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Inferred column types
    #[serde(default)]
    pub types: Vec<ColumnType>,
    /// Regexes that must match a majority of sampled values
    #[serde(default)]
    pub value_patterns: Vec<String>,
}

/// Ordered rule list; earlier rules win within each matching stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensitivityLexicon {
    pub rules: Vec<LexiconRule>,
}

type RuleRow = (
    Sensitivity,
    &'static [&'static str],
    &'static [&'static str],
    &'static [ColumnType],
    &'static [&'static str],
);

static STANDARD_RULES: &[RuleRow] = &[
    (
        Sensitivity::Pii,
        &[
            "first_name", "last_name", "email", "phone", "address_line1", "date_of_birth",
            "CUST_NAME", "ADDR1", "EMAIL", "PHONE", "PersonEmail", "Phone", "MailingStreet",
            "FULL_NAME", "EMAIL_ADDR", "PHONE_NUM", "STREET_ADDR", "FirstName", "LastName",
        ],
        &["email", "phone", "addr", "name", "birth", "dob"],
        &[ColumnType::Email, ColumnType::Phone],
        &[],
    ),
    (
        Sensitivity::Spii,
        &[
            "ssn_hash", "fico_score", "annual_income", "FICO", "CREDIT_SCORE", "risk_tier",
            "Annual_Revenue__c", "RISK_RATING", "probability_of_default", "loss_given_default",
        ],
        &["ssn", "fico", "income", "credit_score", "of_default", "risk_tier", "risk_rating"],
        &[],
        &[r"^\d{3}-\d{2}-\d{4}$"],
    ),
    (
        Sensitivity::Confidential,
        &[
            "account_number", "account_id", "customer_id", "balance", "credit_limit", "apr",
            "amount", "loss_amount", "risk_score", "CIF_NUM", "AccountId", "PARTY_ID",
            "composite_score", "expected_loss",
        ],
        &["account", "balance", "limit", "amount", "score"],
        &[],
        &[],
    ),
];

impl SensitivityLexicon {
    pub fn new(rules: Vec<LexiconRule>) -> Self {
        Self { rules }
    }

    /// The banking lexicon shipped as the default policy
    pub fn standard() -> Self {
        fn to_vec(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        let rules = STANDARD_RULES
            .iter()
            .map(|(class, columns, patterns, types, values)| LexiconRule {
                class: *class,
                columns: to_vec(columns),
                patterns: to_vec(patterns),
                types: types.to_vec(),
                value_patterns: to_vec(values),
            })
            .collect();
        Self { rules }
    }
}

impl Default for SensitivityLexicon {
    fn default() -> Self {
        Self::standard()
    }
}

/// How a classification was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchSource {
    Override,
    ExactName,
    NamePattern,
    Type,
    ValuePattern,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub sensitivity: Sensitivity,
    pub source: MatchSource,
    pub warning: Option<Warning>,
}

struct CompiledRule {
    class: Sensitivity,
    columns: HashSet<String>,
    patterns: Vec<Regex>,
    types: Vec<ColumnType>,
    value_patterns: Vec<Regex>,
}

/// Deterministic classifier compiled from a lexicon and curator overrides
pub struct SensitivityClassifier {
    rules: Vec<CompiledRule>,
    overrides: BTreeMap<String, Sensitivity>,
    warn_unclassified: bool,
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| CatalogueError::InvalidPattern(format!("'{}': {}", p, e)))
        })
        .collect()
}

impl SensitivityClassifier {
    pub fn new(
        lexicon: &SensitivityLexicon,
        overrides: BTreeMap<String, Sensitivity>,
        warn_unclassified: bool,
    ) -> Result<Self> {
        let rules = lexicon
            .rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    class: rule.class,
                    columns: rule.columns.iter().cloned().collect(),
                    patterns: compile_all(&rule.patterns)?,
                    types: rule.types.clone(),
                    value_patterns: compile_all(&rule.value_patterns)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            overrides,
            warn_unclassified,
        })
    }

    /// Stages run in order (override, exact name, name pattern, type, value
    /// pattern); within a stage the first rule in lexicon order wins.
    pub fn classify(
        &self,
        table: &str,
        column: &str,
        column_type: ColumnType,
        samples: &[String],
    ) -> Classification {
        let hit = |sensitivity, source| Classification {
            sensitivity,
            source,
            warning: None,
        };

        let qualified = format!("{}.{}", table, column);
        if let Some(class) = self
            .overrides
            .get(&qualified)
            .or_else(|| self.overrides.get(column))
        {
            return hit(*class, MatchSource::Override);
        }

        if let Some(rule) = self.rules.iter().find(|r| r.columns.contains(column)) {
            return hit(rule.class, MatchSource::ExactName);
        }

        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| r.patterns.iter().any(|p| p.is_match(column)))
        {
            return hit(rule.class, MatchSource::NamePattern);
        }

        if let Some(rule) = self.rules.iter().find(|r| r.types.contains(&column_type)) {
            return hit(rule.class, MatchSource::Type);
        }

        if !samples.is_empty() {
            let majority = |re: &Regex| samples.iter().filter(|s| re.is_match(s)).count() * 2 > samples.len();
            if let Some(rule) = self
                .rules
                .iter()
                .find(|r| r.value_patterns.iter().any(majority))
            {
                return hit(rule.class, MatchSource::ValuePattern);
            }
        }

        let warning = self.warn_unclassified.then(|| {
            Warning::new(
                WarningKind::ClassificationWarning,
                "no lexicon rule matched; classified PUBLIC",
            )
            .for_table(table)
            .for_column(column)
        });

        Classification {
            sensitivity: Sensitivity::Public,
            source: MatchSource::Default,
            warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> SensitivityClassifier {
        SensitivityClassifier::new(&SensitivityLexicon::standard(), BTreeMap::new(), true).unwrap()
    }

    #[test]
    fn test_standard_lexicon_classes() {
        let c = standard();
        let class = |name: &str| c.classify("t", name, ColumnType::String, &[]).sensitivity;
        assert_eq!(class("email"), Sensitivity::Pii);
        assert_eq!(class("last_name"), Sensitivity::Pii);
        assert_eq!(class("ssn_hash"), Sensitivity::Spii);
        assert_eq!(class("annual_income"), Sensitivity::Spii);
        assert_eq!(class("probability_of_default"), Sensitivity::Spii);
        assert_eq!(class("credit_limit"), Sensitivity::Confidential);
        assert_eq!(class("current_balance"), Sensitivity::Confidential);
        assert_eq!(class("status"), Sensitivity::Public);
    }

    #[test]
    fn test_exact_name_beats_earlier_pattern() {
        // "risk_score" is listed as CONFIDENTIAL even though SPII patterns come first
        let c = standard();
        let result = c.classify("t", "risk_score", ColumnType::Float, &[]);
        assert_eq!(result.sensitivity, Sensitivity::Confidential);
        assert_eq!(result.source, MatchSource::ExactName);
    }

    #[test]
    fn test_type_and_value_matches() {
        let c = standard();
        let by_type = c.classify("t", "contact", ColumnType::Email, &[]);
        assert_eq!(by_type.sensitivity, Sensitivity::Pii);
        assert_eq!(by_type.source, MatchSource::Type);

        let samples = vec!["123-45-6789".to_string(), "987-65-4321".to_string()];
        let by_value = c.classify("t", "tax_ref", ColumnType::String, &samples);
        assert_eq!(by_value.sensitivity, Sensitivity::Spii);
        assert_eq!(by_value.source, MatchSource::ValuePattern);
    }

    #[test]
    fn test_unmatched_is_public_with_warning() {
        let c = standard();
        let result = c.classify("accounts", "status", ColumnType::String, &[]);
        assert_eq!(result.sensitivity, Sensitivity::Public);
        let warning = result.warning.unwrap();
        assert_eq!(warning.kind, WarningKind::ClassificationWarning);
        assert_eq!(warning.column.as_deref(), Some("status"));

        let quiet =
            SensitivityClassifier::new(&SensitivityLexicon::standard(), BTreeMap::new(), false)
                .unwrap();
        assert!(quiet.classify("t", "status", ColumnType::String, &[]).warning.is_none());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut overrides = BTreeMap::new();
        overrides.insert("dim_customer.segment".to_string(), Sensitivity::Confidential);
        overrides.insert("email".to_string(), Sensitivity::Public);
        let c = SensitivityClassifier::new(&SensitivityLexicon::standard(), overrides, true).unwrap();

        assert_eq!(
            c.classify("dim_customer", "segment", ColumnType::String, &[]).sensitivity,
            Sensitivity::Confidential
        );
        assert_eq!(
            c.classify("other", "segment", ColumnType::String, &[]).sensitivity,
            Sensitivity::Public
        );
        assert_eq!(
            c.classify("t", "email", ColumnType::Email, &[]).source,
            MatchSource::Override
        );
    }

    #[test]
    fn test_curator_extended_lexicon() {
        let yaml = r#"
- class: SPII
  patterns: ["passport"]
- class: CONFIDENTIAL
  columns: ["internal_note"]
"#;
        let lexicon: SensitivityLexicon = serde_yaml::from_str(yaml).unwrap();
        let c = SensitivityClassifier::new(&lexicon, BTreeMap::new(), true).unwrap();
        assert_eq!(
            c.classify("t", "PASSPORT_NO", ColumnType::String, &[]).sensitivity,
            Sensitivity::Spii
        );
        assert_eq!(
            c.classify("t", "email", ColumnType::String, &[]).sensitivity,
            Sensitivity::Public
        );
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let lexicon = SensitivityLexicon::new(vec![LexiconRule {
            class: Sensitivity::Pii,
            columns: vec![],
            patterns: vec!["(unclosed".into()],
            types: vec![],
            value_patterns: vec![],
        }]);
        assert!(matches!(
            SensitivityClassifier::new(&lexicon, BTreeMap::new(), true),
            Err(CatalogueError::InvalidPattern(_))
        ));
    }
}
