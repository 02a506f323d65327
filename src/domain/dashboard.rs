// Dashboard domain model - build outcomes reported back to the caller
use super::widget::{ChartAxisBinding, GridPosition, WidgetKind};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetStatus {
    /// Attached to a newly created report or to a saved filter.
    Created,
    /// Attached to an existing report found by the matcher.
    Reused,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetOutcome {
    pub widget_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<i64>,
    pub status: WidgetStatus,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub used_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<GridPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WidgetOutcome {
    pub fn failed(widget_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            widget_name: widget_name.into(),
            report_id: None,
            filter_id: None,
            widget_id: None,
            status: WidgetStatus::Failed,
            used_fallback: false,
            position: None,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status != WidgetStatus::Failed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardBuildResult {
    pub dashboard_id: Option<i64>,
    pub widget_results: Vec<WidgetOutcome>,
    pub errors: Vec<String>,
}

impl DashboardBuildResult {
    pub fn succeeded_count(&self) -> usize {
        self.widget_results.iter().filter(|w| w.succeeded()).count()
    }
}

/// What a widget is backed by once its report has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetSource {
    Report(i64),
    Filter(i64),
}

/// Parameters for adding one widget to a remote dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWidget {
    pub dashboard_id: i64,
    pub title: String,
    pub kind: WidgetKind,
    pub source: WidgetSource,
    pub position: GridPosition,
    pub colour: Option<String>,
    pub chart_axis: Option<ChartAxisBinding>,
}
