// Report service - creates reports that are guaranteed to run, or reports why not
use crate::application::auto_fix::AutoFixer;
use crate::application::psa_repository::PsaRepository;
use crate::application::vetted_library::VettedSqlLibrary;
use crate::domain::report::{FixAttempt, NewReport, SchemaCatalog};
use crate::domain::widget::{ChartAxisBinding, WidgetTemplate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sql: String,
    #[serde(default)]
    pub template_key: Option<String>,
    #[serde(default)]
    pub chart_type: Option<String>,
    #[serde(default)]
    pub chart_axis: Option<ChartAxisBinding>,
}

impl ReportRequest {
    /// Request for a report backing a catalog widget. `None` for filter-backed templates.
    pub fn from_template(template: &WidgetTemplate) -> Option<Self> {
        Some(Self {
            name: template.display_name.clone(),
            description: template.description.clone(),
            sql: template.sql_template.clone()?,
            template_key: Some(template.semantic_key().to_string()),
            chart_type: template.kind.report_chart_type().map(str::to_string),
            chart_axis: template.chart_axis.clone(),
        })
    }
}

/// `success` is only ever true together with `validated`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCreation {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    pub validated: bool,
    pub used_fallback: bool,
    pub attempts_used: u32,
    pub fixes_applied: Vec<FixAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportCreation {
    fn failed(error: impl Into<String>, attempts_used: u32, fixes_applied: Vec<FixAttempt>) -> Self {
        Self {
            success: false,
            report_id: None,
            validated: false,
            used_fallback: false,
            attempts_used,
            fixes_applied,
            error: Some(error.into()),
        }
    }
}

#[derive(Clone)]
pub struct ReportService {
    repository: Arc<dyn PsaRepository>,
    fixer: AutoFixer,
    vetted: Arc<VettedSqlLibrary>,
    category: String,
    share_reports: bool,
    max_fix_attempts: u32,
}

impl ReportService {
    pub fn new(
        repository: Arc<dyn PsaRepository>,
        fixer: AutoFixer,
        vetted: Arc<VettedSqlLibrary>,
        category: String,
        share_reports: bool,
        max_fix_attempts: u32,
    ) -> Self {
        Self {
            repository,
            fixer,
            vetted,
            category,
            share_reports,
            max_fix_attempts,
        }
    }

    /// Create a report, repair it if needed, and fall back to the vetted SQL for
    /// `template_key` when repair fails. A report that still does not run is deleted.
    pub async fn create_validated_report(
        &self,
        request: ReportRequest,
        schema: Option<&SchemaCatalog>,
    ) -> ReportCreation {
        let axis = request.chart_axis.clone();
        let new_report = NewReport {
            name: request.name.clone(),
            description: request.description.clone(),
            sql_query: request.sql.clone(),
            category: self.category.clone(),
            is_shared: self.share_reports,
            chart_type: request.chart_type.clone(),
            x_axis: axis.as_ref().map(|a| a.x_axis.clone()),
            y_axis: axis.map(|a| a.y_axis),
        };

        let report = match self.repository.create_report(new_report).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("Creating report '{}' failed: {}", request.name, e);
                return ReportCreation::failed(e.user_message(), 0, Vec::new());
            }
        };

        let outcome = self
            .fixer
            .validate_and_fix_report(report.id, self.max_fix_attempts, schema)
            .await;
        if outcome.is_valid() {
            return ReportCreation {
                success: true,
                report_id: Some(report.id),
                validated: true,
                used_fallback: false,
                attempts_used: outcome.attempts_used,
                fixes_applied: outcome.fixes_applied,
                error: None,
            };
        }

        let error = outcome
            .validation
            .error
            .clone()
            .unwrap_or_else(|| "report could not be validated".to_string());

        if let Some(key) = request.template_key.as_deref() {
            if let Some(sql) = self.vetted.get_validated_sql(key) {
                tracing::warn!(
                    "Report '{}' could not be repaired ({}); substituting vetted template '{}'",
                    request.name,
                    error,
                    key
                );
                if self.substitute(report.id, sql).await {
                    return ReportCreation {
                        success: true,
                        report_id: Some(report.id),
                        validated: true,
                        used_fallback: true,
                        attempts_used: outcome.attempts_used,
                        fixes_applied: outcome.fixes_applied,
                        error: None,
                    };
                }
                tracing::error!("Vetted template '{}' failed validation", key);
            }
        }

        self.discard(report.id).await;
        ReportCreation::failed(error, outcome.attempts_used, outcome.fixes_applied)
    }

    async fn substitute(&self, report_id: i64, sql: &str) -> bool {
        if let Err(e) = self.repository.update_report_sql(report_id, sql).await {
            tracing::warn!("Could not store vetted SQL on report {}: {}", report_id, e);
            return false;
        }
        self.fixer.validator().validate_stored(report_id, sql).await.valid
    }

    async fn discard(&self, report_id: i64) {
        if let Err(e) = self.repository.delete_report(report_id).await {
            tracing::warn!("Could not delete unvalidated report {}: {}", report_id, e);
        }
    }
}
