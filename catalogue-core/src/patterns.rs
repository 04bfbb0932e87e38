//! Column type definitions and the value recognizers used for inference

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

// A bare digit run is never a phone number unless it carries a leading '+'.
static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:\+\d{8,15}|(?:\+\d{1,3}[\s.-]?)?(?:\(\d{3}\)\s?|\d{3}[\s.-])\d{3}[\s.-]\d{4})$",
    )
    .unwrap()
});

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?$")
        .unwrap()
});

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-:.]+$").unwrap());

const BOOLEAN_LITERALS: [&str; 6] = ["true", "false", "yes", "no", "1", "0"];

/// Semantic type inferred for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Identifier,
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Email,
    Phone,
}

impl ColumnType {
    /// Value-level recognizers in the order they are tried. Identifier is
    /// absent because it also depends on column cardinality.
    pub fn inference_order() -> [ColumnType; 6] {
        [
            ColumnType::Email,
            ColumnType::Phone,
            ColumnType::Date,
            ColumnType::Boolean,
            ColumnType::Integer,
            ColumnType::Float,
        ]
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    pub fn is_textual(self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::Email | ColumnType::Phone | ColumnType::Identifier
        )
    }

    /// Whether a single non-null rendered value conforms to this type.
    pub fn conforms(self, value: &str) -> bool {
        let value = value.trim();
        match self {
            ColumnType::Email => EMAIL.is_match(value),
            ColumnType::Phone => PHONE.is_match(value),
            ColumnType::Date => parse_date(value).is_some(),
            ColumnType::Boolean => BOOLEAN_LITERALS
                .iter()
                .any(|lit| lit.eq_ignore_ascii_case(value)),
            ColumnType::Integer => {
                parse_number(value).map_or(false, |n| n.fract() == 0.0)
            }
            ColumnType::Float => parse_number(value).is_some(),
            ColumnType::Identifier => IDENTIFIER.is_match(value),
            ColumnType::String => true,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnType::Identifier => "identifier",
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Email => "email",
            ColumnType::Phone => "phone",
        };
        f.write_str(label)
    }
}

/// Finite numbers only; "nan" and "inf" are not numeric values.
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// ISO date, optionally followed by a time component.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if !DATE.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(&value[..10], "%Y-%m-%d").ok()
}
