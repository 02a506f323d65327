// Auto-fix loop - bounded validate/rewrite cycles over a stored report
use crate::application::psa_repository::PsaRepository;
use crate::application::sql_validator::SqlValidator;
use crate::domain::report::{ErrorCategory, FixAttempt, FixOutcome, SchemaCatalog, ValidationResult};
use crate::domain::sql_rules::apply_fix;
use std::sync::Arc;

#[derive(Clone)]
pub struct AutoFixer {
    repository: Arc<dyn PsaRepository>,
    validator: SqlValidator,
}

impl AutoFixer {
    pub fn new(repository: Arc<dyn PsaRepository>, validator: SqlValidator) -> Self {
        Self { repository, validator }
    }

    pub fn validator(&self) -> &SqlValidator {
        &self.validator
    }

    /// Validate a report, rewriting its SQL one rule at a time until it runs,
    /// no rule applies, or `max_attempts` validations have been made.
    ///
    /// `attempts_used` counts the rewrites that were persisted, so an already
    /// valid report returns `0` with no fixes. A value of `0` for
    /// `max_attempts` is treated as `1`.
    pub async fn validate_and_fix_report(
        &self,
        report_id: i64,
        max_attempts: u32,
        schema: Option<&SchemaCatalog>,
    ) -> FixOutcome {
        let sql = match self.repository.get_report(report_id).await {
            Ok(report) => report.sql_query,
            Err(e) => {
                tracing::warn!("Cannot fix report {}: {}", report_id, e);
                return FixOutcome {
                    validation: ValidationResult::failure(e.user_message(), ErrorCategory::Unclassified),
                    attempts_used: 0,
                    fixes_applied: Vec::new(),
                    final_sql: String::new(),
                };
            }
        };
        self.fix_loop(report_id, sql, max_attempts.max(1), schema).await
    }

    async fn fix_loop(
        &self,
        report_id: i64,
        mut sql: String,
        max_attempts: u32,
        schema: Option<&SchemaCatalog>,
    ) -> FixOutcome {
        let mut fixes_applied: Vec<FixAttempt> = Vec::new();
        let mut pending_rule: Option<String> = None;
        let mut attempt: u32 = 0;

        loop {
            let validation = self.validator.validate_stored(report_id, &sql).await;

            if let Some(rule) = pending_rule.take() {
                fixes_applied.push(FixAttempt {
                    attempt_number: attempt,
                    rule_applied: rule,
                    sql_query: sql.clone(),
                    validation_result: validation.clone(),
                });
            }

            if validation.valid || attempt + 1 >= max_attempts {
                return finish(validation, attempt, fixes_applied, sql);
            }

            let category = validation.category().unwrap_or(ErrorCategory::Unclassified);
            let error = validation.error.as_deref().unwrap_or_default();
            let Some(rewrite) = apply_fix(category, &sql, error, schema) else {
                tracing::debug!("No rewrite rule for {} on report {}", category, report_id);
                return finish(validation, attempt, fixes_applied, sql);
            };

            if let Err(e) = self.repository.update_report_sql(report_id, &rewrite.sql).await {
                tracing::warn!("Could not persist rewritten SQL for report {}: {}", report_id, e);
                return finish(validation, attempt, fixes_applied, sql);
            }

            tracing::info!("Report {}: applied '{}'", report_id, rewrite.rule);
            sql = rewrite.sql;
            pending_rule = Some(rewrite.rule);
            attempt += 1;
        }
    }
}

fn finish(validation: ValidationResult, attempts_used: u32, fixes_applied: Vec<FixAttempt>, final_sql: String) -> FixOutcome {
    FixOutcome {
        validation,
        attempts_used,
        fixes_applied,
        final_sql,
    }
}
