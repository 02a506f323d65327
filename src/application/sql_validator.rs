// SQL validator - runs reports remotely and classifies failures
use crate::application::errors::ApiError;
use crate::application::psa_repository::PsaRepository;
use crate::domain::report::{ErrorCategory, ReportRun, ValidationResult};
use crate::domain::sql_rules::classify_error;
use std::sync::Arc;

#[derive(Clone)]
pub struct SqlValidator {
    repository: Arc<dyn PsaRepository>,
    row_cap: usize,
}

impl SqlValidator {
    pub fn new(repository: Arc<dyn PsaRepository>, row_cap: usize) -> Self {
        Self {
            repository,
            row_cap: row_cap.max(1),
        }
    }

    /// Execute a stored report and classify the outcome.
    pub async fn validate_report(&self, report_id: i64) -> ValidationResult {
        match self.repository.get_report(report_id).await {
            Ok(report) => self.validate_stored(report_id, &report.sql_query).await,
            Err(e) => api_failure(report_id, &e),
        }
    }

    /// Validate a report whose current SQL text the caller already holds.
    pub async fn validate_stored(&self, report_id: i64, sql: &str) -> ValidationResult {
        match self.repository.run_report(report_id, self.row_cap).await {
            Ok(run) => interpret(run, sql),
            Err(e) => api_failure(report_id, &e),
        }
    }

    /// Validate ad-hoc SQL without a stored report
    pub async fn validate_sql(&self, sql: &str) -> ValidationResult {
        match self.repository.execute_sql(sql, self.row_cap).await {
            Ok(run) => interpret(run, sql),
            Err(e) => {
                tracing::warn!("SQL execution request failed: {}", e);
                ValidationResult::failure(e.user_message(), ErrorCategory::Unclassified)
            }
        }
    }
}

fn interpret(run: ReportRun, sql: &str) -> ValidationResult {
    match run.error {
        None => ValidationResult::success(run.row_count, run.columns),
        Some(error) => {
            let category = classify_error(&error, sql);
            tracing::debug!("SQL failed with {}: {}", category, error);
            ValidationResult::failure(error, category)
        }
    }
}

/// Transport failures cannot be repaired by rewriting SQL.
fn api_failure(report_id: i64, error: &ApiError) -> ValidationResult {
    tracing::warn!("Validation of report {} failed at the API [{}]: {}", report_id, error.category(), error);
    ValidationResult::failure(error.user_message(), ErrorCategory::Unclassified)
}
