// In-memory PSA used by the application-layer tests
use crate::application::errors::ApiError;
use crate::application::psa_repository::{ApiResult, PsaRepository};
use crate::domain::dashboard::NewWidget;
use crate::domain::report::{NewReport, Report, ReportRun, SchemaCatalog, SchemaObject};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

pub const ORDER_BY_IN_VIEW: &str = "The ORDER BY clause is invalid in views, inline functions, derived tables, subqueries, and common table expressions, unless TOP, OFFSET or FOR XML is also specified.";

const VALID_OBJECTS: &[&str] = &[
    "FAULTS", "ACTIONS", "UNAME", "AREA", "SITE", "TSTATUS", "POLICY", "REQUESTTYPE", "USERS",
];

const KEYWORDS: &[&str] = &["FROM", "WHERE", "GROUP", "ORDER", "JOIN", ","];

#[derive(Default)]
struct FakeState {
    reports: BTreeMap<i64, Report>,
    next_id: i64,
    dashboards: Vec<(i64, String)>,
    widgets: Vec<NewWidget>,
    sql_updates: Vec<(i64, String)>,
    deleted: Vec<i64>,
    runs: usize,
}

/// Simulates the remote SQL engine's error strings and stores reports,
/// dashboards and widgets in memory.
pub struct FakePsa {
    state: Mutex<FakeState>,
    bad_columns: HashSet<String>,
    broken_sql: Vec<String>,
    schema: Option<SchemaCatalog>,
    offline: bool,
    fail_dashboard: bool,
    fail_widgets: bool,
}

impl FakePsa {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState { next_id: 100, ..Default::default() }),
            bad_columns: HashSet::new(),
            broken_sql: Vec::new(),
            schema: None,
            offline: false,
            fail_dashboard: false,
            fail_widgets: false,
        }
    }

    /// Treat a column name as unknown to the engine.
    pub fn with_bad_column(mut self, column: &str) -> Self {
        self.bad_columns.insert(column.to_ascii_lowercase());
        self
    }

    /// Any SQL exactly equal to this text fails with an unclassifiable error.
    pub fn with_broken_sql(mut self, sql: &str) -> Self {
        self.broken_sql.push(sql.trim().to_string());
        self
    }

    pub fn with_schema(mut self, schema: SchemaCatalog) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn failing_dashboard_creation(mut self) -> Self {
        self.fail_dashboard = true;
        self
    }

    pub fn failing_widgets(mut self) -> Self {
        self.fail_widgets = true;
        self
    }

    pub fn seed_report(&self, name: &str, description: &str, sql: &str, modified_day: u32) -> i64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.reports.insert(
            id,
            Report {
                id,
                name: name.to_string(),
                description: description.to_string(),
                sql_query: sql.to_string(),
                category: "Existing".to_string(),
                chart_type: None,
                x_axis: None,
                y_axis: None,
                is_shared: true,
                last_modified: Utc.with_ymd_and_hms(2026, 1, modified_day, 0, 0, 0).single(),
            },
        );
        id
    }

    pub fn report(&self, id: i64) -> Option<Report> {
        self.state.lock().unwrap().reports.get(&id).cloned()
    }

    pub fn report_count(&self) -> usize {
        self.state.lock().unwrap().reports.len()
    }

    pub fn widgets(&self) -> Vec<NewWidget> {
        self.state.lock().unwrap().widgets.clone()
    }

    pub fn dashboards(&self) -> Vec<(i64, String)> {
        self.state.lock().unwrap().dashboards.clone()
    }

    pub fn sql_updates(&self) -> Vec<(i64, String)> {
        self.state.lock().unwrap().sql_updates.clone()
    }

    pub fn deleted(&self) -> Vec<i64> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn runs(&self) -> usize {
        self.state.lock().unwrap().runs
    }

    fn check_online(&self) -> ApiResult<()> {
        if self.offline {
            return Err(ApiError::Connection { reason: "connection refused".to_string() });
        }
        Ok(())
    }

    /// Evaluate SQL the way the remote engine reports failures.
    pub fn evaluate(&self, sql: &str) -> ReportRun {
        let fail = |error: String| ReportRun { error: Some(error), ..Default::default() };

        if self.broken_sql.iter().any(|b| b == sql.trim()) {
            return fail("Query execution failed.".to_string());
        }

        let objects = Regex::new(r"(?i)\b(?:FROM|JOIN)\s+(?:\w+\.)?([A-Za-z_][A-Za-z0-9_]*)").unwrap();
        for caps in objects.captures_iter(sql) {
            let name = &caps[1];
            if !VALID_OBJECTS.iter().any(|o| o.eq_ignore_ascii_case(name)) {
                return fail(format!("Invalid object name '{}'.", name));
            }
        }

        let words = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
        for word in words.find_iter(sql) {
            if self.bad_columns.contains(&word.as_str().to_ascii_lowercase()) {
                return fail(format!("Invalid column name '{}'.", word.as_str()));
            }
        }

        let upper = sql.to_ascii_uppercase();
        if upper.contains("ORDER BY") && !upper.contains(" TOP ") {
            return fail(ORDER_BY_IN_VIEW.to_string());
        }

        let tokens: Vec<&str> = sql.split_whitespace().collect();
        for (i, token) in tokens.iter().enumerate() {
            if !token.eq_ignore_ascii_case("AS") {
                continue;
            }
            let (Some(first), Some(second)) = (tokens.get(i + 1), tokens.get(i + 2)) else {
                continue;
            };
            let is_word = |t: &str| t.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
            let first_is_alias = is_word(first) && !first.ends_with(',') && !first.contains(')');
            let second_is_word = is_word(second)
                && !KEYWORDS.iter().any(|k| second.trim_end_matches(',').eq_ignore_ascii_case(k));
            if first_is_alias && second_is_word {
                return fail(format!("Incorrect syntax near '{}'.", second.trim_end_matches(',')));
            }
        }

        ReportRun {
            columns: vec!["label".to_string(), "value".to_string()],
            row_count: 3,
            error: None,
        }
    }
}

pub fn halo_schema() -> SchemaCatalog {
    SchemaCatalog {
        objects: VALID_OBJECTS
            .iter()
            .map(|name| SchemaObject {
                name: name.to_string(),
                columns: match *name {
                    "FAULTS" => vec!["Faultid", "Symptom", "Status", "Seriousness", "Assignedtoint"],
                    "UNAME" => vec!["Unum", "uname"],
                    _ => vec![],
                }
                .into_iter()
                .map(str::to_string)
                .collect(),
            })
            .collect(),
    }
}

#[async_trait]
impl PsaRepository for FakePsa {
    async fn list_reports(&self, search: Option<&str>, page_size: usize) -> ApiResult<Vec<Report>> {
        self.check_online()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .reports
            .values()
            .filter(|r| search.is_none_or(|q| r.name.to_lowercase().contains(&q.to_lowercase())))
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn get_report(&self, report_id: i64) -> ApiResult<Report> {
        self.check_online()?;
        self.report(report_id)
            .ok_or_else(|| ApiError::NotFound { resource: format!("report {}", report_id) })
    }

    async fn create_report(&self, report: NewReport) -> ApiResult<Report> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let created = Report {
            id: state.next_id,
            name: report.name,
            description: report.description,
            sql_query: report.sql_query,
            category: report.category,
            chart_type: report.chart_type,
            x_axis: report.x_axis,
            y_axis: report.y_axis,
            is_shared: report.is_shared,
            last_modified: Some(Utc::now()),
        };
        state.reports.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_report_sql(&self, report_id: i64, sql: &str) -> ApiResult<()> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        let report = state
            .reports
            .get_mut(&report_id)
            .ok_or_else(|| ApiError::NotFound { resource: format!("report {}", report_id) })?;
        report.sql_query = sql.to_string();
        state.sql_updates.push((report_id, sql.to_string()));
        Ok(())
    }

    async fn delete_report(&self, report_id: i64) -> ApiResult<()> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.reports.remove(&report_id);
        state.deleted.push(report_id);
        Ok(())
    }

    async fn run_report(&self, report_id: i64, _row_cap: usize) -> ApiResult<ReportRun> {
        self.check_online()?;
        let report = self.get_report(report_id).await?;
        self.state.lock().unwrap().runs += 1;
        Ok(self.evaluate(&report.sql_query))
    }

    async fn execute_sql(&self, sql: &str, _row_cap: usize) -> ApiResult<ReportRun> {
        self.check_online()?;
        self.state.lock().unwrap().runs += 1;
        Ok(self.evaluate(sql))
    }

    async fn create_dashboard(&self, name: &str, _description: &str) -> ApiResult<i64> {
        self.check_online()?;
        if self.fail_dashboard {
            return Err(ApiError::Server { status: 500, body: "dashboard store unavailable".to_string() });
        }
        let mut state = self.state.lock().unwrap();
        let id = 9000 + state.dashboards.len() as i64;
        state.dashboards.push((id, name.to_string()));
        Ok(id)
    }

    async fn add_widget(&self, widget: NewWidget) -> ApiResult<i64> {
        self.check_online()?;
        if self.fail_widgets {
            return Err(ApiError::RateLimited);
        }
        let mut state = self.state.lock().unwrap();
        state.widgets.push(widget);
        Ok(state.widgets.len() as i64)
    }

    async fn list_schema(&self) -> ApiResult<SchemaCatalog> {
        self.check_online()?;
        self.schema
            .clone()
            .ok_or_else(|| ApiError::NotFound { resource: "schema".to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_engine_errors() {
        let psa = FakePsa::new().with_bad_column("TicketID");
        assert!(psa.evaluate("SELECT COUNT(*) FROM FAULTS").error.is_none());
        assert_eq!(
            psa.evaluate("SELECT SUM(timetaken) FROM TIMETAKEN").error.as_deref(),
            Some("Invalid object name 'TIMETAKEN'.")
        );
        assert_eq!(
            psa.evaluate("SELECT TicketID FROM FAULTS").error.as_deref(),
            Some("Invalid column name 'TicketID'.")
        );
        assert_eq!(psa.evaluate("SELECT uname FROM UNAME ORDER BY uname").error.as_deref(), Some(ORDER_BY_IN_VIEW));
        assert_eq!(
            psa.evaluate("SELECT COUNT(*) AS Open Tickets FROM FAULTS").error.as_deref(),
            Some("Incorrect syntax near 'Tickets'.")
        );
        assert!(psa.evaluate("SELECT COUNT(*) AS [Open Tickets] FROM FAULTS").error.is_none());
        assert!(psa.evaluate("SELECT CAST(x AS int) AS Total FROM FAULTS").error.is_none());
    }
}
