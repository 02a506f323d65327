// Repository trait for the remote PSA API
use crate::application::errors::ApiError;
use crate::domain::dashboard::NewWidget;
use crate::domain::report::{NewReport, Report, ReportRun, SchemaCatalog};
use async_trait::async_trait;

pub type ApiResult<T> = Result<T, ApiError>;

#[async_trait]
pub trait PsaRepository: Send + Sync {
    /// List reports, optionally filtered by free text, bounded by page size
    async fn list_reports(&self, search: Option<&str>, page_size: usize) -> ApiResult<Vec<Report>>;

    async fn get_report(&self, report_id: i64) -> ApiResult<Report>;

    async fn create_report(&self, report: NewReport) -> ApiResult<Report>;

    /// Persist rewritten SQL on an existing report
    async fn update_report_sql(&self, report_id: i64, sql: &str) -> ApiResult<()>;

    async fn delete_report(&self, report_id: i64) -> ApiResult<()>;

    /// Execute a stored report, returning at most `row_cap` rows.
    /// SQL errors come back inside `ReportRun::error`, not as `Err`.
    async fn run_report(&self, report_id: i64, row_cap: usize) -> ApiResult<ReportRun>;

    /// Execute ad-hoc SQL with the same result shape as `run_report`
    async fn execute_sql(&self, sql: &str, row_cap: usize) -> ApiResult<ReportRun>;

    async fn create_dashboard(&self, name: &str, description: &str) -> ApiResult<i64>;

    async fn add_widget(&self, widget: NewWidget) -> ApiResult<i64>;

    /// Known tables/views and columns, used to improve fix accuracy
    async fn list_schema(&self) -> ApiResult<SchemaCatalog>;
}
