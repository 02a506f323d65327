// PSA REST API repository implementation
use crate::application::errors::ApiError;
use crate::application::psa_repository::{ApiResult, PsaRepository};
use crate::domain::dashboard::{NewWidget, WidgetSource};
use crate::domain::report::{NewReport, Report, ReportRun, SchemaCatalog};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PsaHttpRepository {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct ReportListResponse {
    #[serde(default)]
    reports: Vec<Report>,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    error: Option<String>,
}

impl From<RunResponse> for ReportRun {
    fn from(response: RunResponse) -> Self {
        ReportRun {
            columns: response.columns,
            row_count: response.rows.len(),
            error: response.error.filter(|e| !e.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: i64,
}

#[derive(Debug, Serialize)]
struct WidgetPayload<'a> {
    dashboard_id: i64,
    title: &'a str,
    #[serde(rename = "type")]
    widget_type: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_id: Option<i64>,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    colour: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chart_x_axis: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chart_y_axis: Option<&'a str>,
}

impl<'a> From<&'a NewWidget> for WidgetPayload<'a> {
    fn from(widget: &'a NewWidget) -> Self {
        let (report_id, filter_id) = match widget.source {
            WidgetSource::Report(id) => (Some(id), None),
            WidgetSource::Filter(id) => (None, Some(id)),
        };
        Self {
            dashboard_id: widget.dashboard_id,
            title: &widget.title,
            widget_type: widget.kind.remote_type_id(),
            report_id,
            filter_id,
            x: widget.position.x,
            y: widget.position.y,
            width: widget.position.width,
            height: widget.position.height,
            colour: widget.colour.as_deref(),
            chart_x_axis: widget.chart_axis.as_ref().map(|a| a.x_axis.as_str()),
            chart_y_axis: widget.chart_axis.as_ref().map(|a| a.y_axis.as_str()),
        }
    }
}

/// Map a non-success HTTP status to a stable error category.
pub fn classify_status(status: StatusCode, body: String, resource: &str) -> ApiError {
    match status.as_u16() {
        401 | 403 => ApiError::Authentication { status: status.as_u16() },
        404 => ApiError::NotFound { resource: resource.to_string() },
        408 | 504 => ApiError::Timeout,
        429 => ApiError::RateLimited,
        code => ApiError::Server { status: code, body },
    }
}

fn classify_transport(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else if error.is_decode() {
        ApiError::Decode { reason: error.to_string() }
    } else {
        ApiError::Connection { reason: error.to_string() }
    }
}

impl PsaHttpRepository {
    pub fn new(base_url: String, api_token: String, timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Connection { reason: e.to_string() })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_token)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder, resource: &str) -> ApiResult<Response> {
        let response = request.send().await.map_err(classify_transport)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("PSA API {} returned {}: {}", resource, status, body);
            return Err(classify_status(status, body, resource));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, resource: &str) -> ApiResult<T> {
        let response = self.send(request, resource).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode { reason: e.to_string() })
    }

    /// SQL errors may arrive as HTTP 400 with the engine message in the body.
    async fn send_run(&self, request: RequestBuilder, resource: &str) -> ApiResult<ReportRun> {
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        if status.is_success() {
            let run: RunResponse = response
                .json()
                .await
                .map_err(|e| ApiError::Decode { reason: e.to_string() })?;
            return Ok(run.into());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST {
            if let Ok(run) = serde_json::from_str::<RunResponse>(&body) {
                if run.error.is_some() {
                    return Ok(run.into());
                }
            }
        }
        Err(classify_status(status, body, resource))
    }
}

#[async_trait]
impl PsaRepository for PsaHttpRepository {
    async fn list_reports(&self, search: Option<&str>, page_size: usize) -> ApiResult<Vec<Report>> {
        let mut path = format!("/api/Report?count={}", page_size);
        if let Some(query) = search {
            path.push_str(&format!("&search={}", urlencoding::encode(query)));
        }
        let response: ReportListResponse = self.send_json(self.request(Method::GET, &path), "report list").await?;
        tracing::debug!("Listed {} reports", response.reports.len());
        Ok(response.reports)
    }

    async fn get_report(&self, report_id: i64) -> ApiResult<Report> {
        let path = format!("/api/Report/{}", report_id);
        self.send_json(self.request(Method::GET, &path), &format!("report {}", report_id))
            .await
    }

    async fn create_report(&self, report: NewReport) -> ApiResult<Report> {
        let request = self.request(Method::POST, "/api/Report").json(&[&report]);
        let created: Report = self.send_json(request, "report").await?;
        tracing::info!("Created report {} '{}'", created.id, created.name);
        Ok(created)
    }

    async fn update_report_sql(&self, report_id: i64, sql: &str) -> ApiResult<()> {
        let body = json!([{ "id": report_id, "sql_query": sql }]);
        let request = self.request(Method::POST, "/api/Report").json(&body);
        self.send(request, &format!("report {}", report_id)).await?;
        Ok(())
    }

    async fn delete_report(&self, report_id: i64) -> ApiResult<()> {
        let path = format!("/api/Report/{}", report_id);
        self.send(self.request(Method::DELETE, &path), &format!("report {}", report_id))
            .await?;
        Ok(())
    }

    async fn run_report(&self, report_id: i64, row_cap: usize) -> ApiResult<ReportRun> {
        let path = format!("/api/Report/{}/run?rowcount={}", report_id, row_cap);
        self.send_run(self.request(Method::GET, &path), &format!("report {}", report_id))
            .await
    }

    async fn execute_sql(&self, sql: &str, row_cap: usize) -> ApiResult<ReportRun> {
        let body = json!({ "sql": sql, "rowcount": row_cap });
        let request = self.request(Method::POST, "/api/Report/execute").json(&body);
        self.send_run(request, "SQL execution").await
    }

    async fn create_dashboard(&self, name: &str, description: &str) -> ApiResult<i64> {
        let body = json!([{ "name": name, "description": description }]);
        let request = self.request(Method::POST, "/api/Dashboard").json(&body);
        let created: IdResponse = self.send_json(request, "dashboard").await?;
        tracing::info!("Created dashboard {} '{}'", created.id, name);
        Ok(created.id)
    }

    async fn add_widget(&self, widget: NewWidget) -> ApiResult<i64> {
        let payload = WidgetPayload::from(&widget);
        let request = self.request(Method::POST, "/api/DashboardWidget").json(&[&payload]);
        let created: IdResponse = self
            .send_json(request, &format!("dashboard {}", widget.dashboard_id))
            .await?;
        Ok(created.id)
    }

    async fn list_schema(&self) -> ApiResult<SchemaCatalog> {
        self.send_json(self.request(Method::GET, "/api/Report/schema"), "schema")
            .await
    }
}
