// Tool handlers - one endpoint per engine operation
use crate::application::dashboard_builder::WidgetSelection;
use crate::application::report_service::ReportRequest;
use crate::domain::widget::{WidgetKind, WidgetTemplate};
use crate::infrastructure::tool_response::{read_params, tool_error, tool_ok, tool_result, ToolResponse};
use crate::presentation::app_state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

type Params<T> = Result<Json<T>, JsonRejection>;

#[derive(Deserialize)]
pub struct NameParams {
    pub name: String,
}

#[derive(Deserialize)]
pub struct KeyParams {
    pub key: String,
}

#[derive(Deserialize)]
pub struct KeywordParams {
    pub keywords: Vec<String>,
}

#[derive(Deserialize)]
pub struct ReportIdParams {
    pub report_id: i64,
}

#[derive(Deserialize)]
pub struct SqlParams {
    pub sql: String,
}

#[derive(Deserialize)]
pub struct FixReportParams {
    pub report_id: i64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub use_schema: bool,
}

#[derive(Deserialize)]
pub struct DescriptionParams {
    pub description: String,
}

#[derive(Deserialize)]
pub struct BuildDashboardParams {
    pub name: String,
    pub widgets: WidgetSelection,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct AddWidgetParams {
    pub dashboard_id: i64,
    pub widget_name: String,
    pub slot: usize,
}

#[derive(Serialize)]
struct TemplateSummary<'a> {
    name: &'a str,
    display_name: &'a str,
    description: &'a str,
    kind: WidgetKind,
    keywords: &'a [String],
    filter_backed: bool,
}

impl<'a> From<&'a WidgetTemplate> for TemplateSummary<'a> {
    fn from(template: &'a WidgetTemplate) -> Self {
        Self {
            name: &template.name,
            display_name: &template.display_name,
            description: &template.description,
            kind: template.kind,
            keywords: &template.keywords,
            filter_backed: template.is_filter_backed(),
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_widget_templates(State(state): State<Arc<AppState>>) -> ToolResponse {
    let templates: Vec<TemplateSummary> = state.catalog.templates().iter().map(TemplateSummary::from).collect();
    tool_ok(&json!({ "templates": templates }))
}

pub async fn get_widget_template(State(state): State<Arc<AppState>>, payload: Params<NameParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    match state.catalog.get_template(&params.name) {
        Some(template) => tool_ok(&json!({ "template": template })),
        None => tool_error(format!("unknown widget template '{}'", params.name)),
    }
}

pub async fn list_layouts(State(state): State<Arc<AppState>>) -> ToolResponse {
    tool_ok(&json!({ "layouts": state.catalog.layouts() }))
}

pub async fn get_layout(State(state): State<Arc<AppState>>, payload: Params<NameParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    match state.catalog.get_layout(&params.name) {
        Some(widgets) => tool_ok(&json!({ "name": params.name, "widgets": widgets })),
        None => tool_error(format!("unknown dashboard layout '{}'", params.name)),
    }
}

pub async fn list_validated_templates(State(state): State<Arc<AppState>>) -> ToolResponse {
    tool_ok(&json!({ "templates": state.vetted.list_validated_templates() }))
}

pub async fn get_validated_sql(State(state): State<Arc<AppState>>, payload: Params<KeyParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    match state.vetted.get_validated_sql(&params.key) {
        Some(sql) => tool_ok(&json!({ "key": params.key, "sql": sql })),
        None => tool_error(format!("no vetted template '{}'", params.key)),
    }
}

pub async fn find_matching_report(State(state): State<Arc<AppState>>, payload: Params<KeywordParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    match state.matcher.find_matching_report(&params.keywords).await {
        Ok(report) => tool_ok(&json!({ "found": report.is_some(), "report": report })),
        Err(e) => tool_error(e.user_message()),
    }
}

pub async fn validate_report(State(state): State<Arc<AppState>>, payload: Params<ReportIdParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let validation = state.validator.validate_report(params.report_id).await;
    tool_result(validation.valid, &validation)
}

pub async fn validate_sql(State(state): State<Arc<AppState>>, payload: Params<SqlParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let validation = state.validator.validate_sql(&params.sql).await;
    tool_result(validation.valid, &validation)
}

pub async fn fix_report(State(state): State<Arc<AppState>>, payload: Params<FixReportParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let schema = if params.use_schema {
        state
            .repository
            .list_schema()
            .await
            .inspect_err(|e| tracing::debug!("Schema unavailable for fix_report: {}", e))
            .ok()
    } else {
        None
    };
    let max_attempts = params.max_attempts.unwrap_or(state.max_fix_attempts);
    let outcome = state
        .fixer
        .validate_and_fix_report(params.report_id, max_attempts, schema.as_ref())
        .await;
    tool_result(outcome.is_valid(), &outcome)
}

pub async fn create_validated_report(State(state): State<Arc<AppState>>, payload: Params<ReportRequest>) -> ToolResponse {
    let request = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let created = state.report_service.create_validated_report(request, None).await;
    tool_result(created.success, &created)
}

pub async fn suggest_widgets(State(state): State<Arc<AppState>>, payload: Params<DescriptionParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let widgets = state.dashboard_builder.suggest_widgets_for_description(&params.description);
    tool_ok(&json!({ "widgets": widgets }))
}

pub async fn build_dashboard(State(state): State<Arc<AppState>>, payload: Params<BuildDashboardParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    match state
        .dashboard_builder
        .build_dashboard(&params.name, &params.widgets, &params.description)
        .await
    {
        Ok(result) => tool_result(result.dashboard_id.is_some(), &result),
        Err(e) => tool_error(e.user_message()),
    }
}

pub async fn add_widget_to_dashboard(State(state): State<Arc<AppState>>, payload: Params<AddWidgetParams>) -> ToolResponse {
    let params = match read_params(payload) {
        Ok(p) => p,
        Err(response) => return response,
    };
    match state
        .dashboard_builder
        .add_widget_to_dashboard(params.dashboard_id, &params.widget_name, params.slot)
        .await
    {
        Ok(outcome) => tool_result(outcome.succeeded(), &outcome),
        Err(e) => tool_error(e.user_message()),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/tools/list_widget_templates", post(list_widget_templates))
        .route("/tools/get_widget_template", post(get_widget_template))
        .route("/tools/list_layouts", post(list_layouts))
        .route("/tools/get_layout", post(get_layout))
        .route("/tools/list_validated_templates", post(list_validated_templates))
        .route("/tools/get_validated_sql", post(get_validated_sql))
        .route("/tools/find_matching_report", post(find_matching_report))
        .route("/tools/validate_report", post(validate_report))
        .route("/tools/validate_sql", post(validate_sql))
        .route("/tools/fix_report", post(fix_report))
        .route("/tools/create_validated_report", post(create_validated_report))
        .route("/tools/suggest_widgets", post(suggest_widgets))
        .route("/tools/build_dashboard", post(build_dashboard))
        .route("/tools/add_widget_to_dashboard", post(add_widget_to_dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
