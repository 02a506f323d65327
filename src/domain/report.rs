// Report domain model - remote SQL reports and their validation outcomes
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A report as owned by the remote PSA system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sql_query: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub chart_type: Option<String>,
    #[serde(default)]
    pub x_axis: Option<String>,
    #[serde(default)]
    pub y_axis: Option<String>,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Parameters for creating a report remotely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReport {
    pub name: String,
    pub description: String,
    pub sql_query: String,
    pub category: String,
    pub is_shared: bool,
    pub chart_type: Option<String>,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
}

/// Result of executing SQL remotely: either data shape or the engine's error text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRun {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    UnknownObject,
    UnknownColumn,
    MissingTopWithOrderBy,
    UnquotedIdentifier,
    Unclassified,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::UnknownObject => "unknown-object",
            ErrorCategory::UnknownColumn => "unknown-column",
            ErrorCategory::MissingTopWithOrderBy => "missing-top-with-order-by",
            ErrorCategory::UnquotedIdentifier => "unquoted-identifier",
            ErrorCategory::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl ValidationResult {
    pub fn success(row_count: usize, columns: Vec<String>) -> Self {
        Self {
            valid: true,
            error: None,
            error_category: None,
            row_count: Some(row_count),
            columns: Some(columns),
        }
    }

    pub fn failure(error: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            error_category: Some(category),
            row_count: None,
            columns: None,
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.error_category
    }
}

/// One rewrite applied by the fix loop, with the validation of the rewritten SQL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixAttempt {
    pub attempt_number: u32,
    pub rule_applied: String,
    pub sql_query: String,
    pub validation_result: ValidationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixOutcome {
    #[serde(flatten)]
    pub validation: ValidationResult,
    pub attempts_used: u32,
    pub fixes_applied: Vec<FixAttempt>,
    pub final_sql: String,
}

impl FixOutcome {
    pub fn is_valid(&self) -> bool {
        self.validation.valid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaObject {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Known remote tables/views and their columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    #[serde(default)]
    pub objects: Vec<SchemaObject>,
}

impl SchemaCatalog {
    pub fn has_object(&self, name: &str) -> bool {
        self.objects.iter().any(|o| o.name.eq_ignore_ascii_case(name))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().flat_map(|o| o.columns.iter().map(String::as_str))
    }
}
