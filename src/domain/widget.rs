// Widget domain model - templates, layouts and grid placement
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of widget kinds a dashboard can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Bar,
    Line,
    Pie,
    Doughnut,
    Counter,
    CounterReport,
    List,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 7] = [
        WidgetKind::Bar,
        WidgetKind::Line,
        WidgetKind::Pie,
        WidgetKind::Doughnut,
        WidgetKind::Counter,
        WidgetKind::CounterReport,
        WidgetKind::List,
    ];

    /// Numeric widget type understood by the remote dashboard API.
    pub fn remote_type_id(self) -> i32 {
        match self {
            WidgetKind::Bar => 1,
            WidgetKind::Line => 2,
            WidgetKind::Pie => 3,
            WidgetKind::Doughnut => 4,
            WidgetKind::Counter => 5,
            WidgetKind::CounterReport => 6,
            WidgetKind::List => 7,
        }
    }

    /// Chart type stored on a report rendered by this widget, if any.
    pub fn report_chart_type(self) -> Option<&'static str> {
        match self {
            WidgetKind::Bar => Some("bar"),
            WidgetKind::Line => Some("line"),
            WidgetKind::Pie => Some("pie"),
            WidgetKind::Doughnut => Some("doughnut"),
            WidgetKind::Counter | WidgetKind::CounterReport | WidgetKind::List => None,
        }
    }

    pub fn is_chart(self) -> bool {
        self.report_chart_type().is_some()
    }

    /// Whether the kind can only render from a report.
    pub fn needs_report(self) -> bool {
        match self {
            WidgetKind::Bar
            | WidgetKind::Line
            | WidgetKind::Pie
            | WidgetKind::Doughnut
            | WidgetKind::CounterReport => true,
            WidgetKind::Counter | WidgetKind::List => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WidgetKind::Bar => "bar",
            WidgetKind::Line => "line",
            WidgetKind::Pie => "pie",
            WidgetKind::Doughnut => "doughnut",
            WidgetKind::Counter => "counter",
            WidgetKind::CounterReport => "counter_report",
            WidgetKind::List => "list",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartAxisBinding {
    pub x_axis: String,
    pub y_axis: String,
}

/// A named, immutable widget definition from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetTemplate {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub kind: WidgetKind,
    #[serde(default)]
    pub sql_template: Option<String>,
    #[serde(default)]
    pub chart_axis: Option<ChartAxisBinding>,
    /// Saved filter backing a counter/list widget that has no SQL.
    #[serde(default)]
    pub filter_id: Option<i64>,
    #[serde(default)]
    pub vetted_key: Option<String>,
    #[serde(default)]
    pub colour: Option<String>,
}

impl WidgetTemplate {
    pub fn is_filter_backed(&self) -> bool {
        self.sql_template.is_none()
    }

    /// Key into the vetted SQL library; the template name unless overridden.
    pub fn semantic_key(&self) -> &str {
        self.vetted_key.as_deref().unwrap_or(&self.name)
    }

    /// Keywords used for report matching, including the display name.
    pub fn match_keywords(&self) -> Vec<String> {
        let mut keywords = Vec::with_capacity(self.keywords.len() + 1);
        keywords.push(self.display_name.clone());
        for keyword in &self.keywords {
            if !keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
                keywords.push(keyword.clone());
            }
        }
        keywords
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardLayout {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub widgets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl GridPosition {
    pub fn overlaps(&self, other: &GridPosition) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Fixed-width column grid; positions wrap row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub columns: u32,
    pub widget_width: u32,
    pub widget_height: u32,
}

impl GridSpec {
    pub fn new(columns: u32, widget_width: u32, widget_height: u32) -> Self {
        Self {
            columns: columns.max(1),
            widget_width: widget_width.max(1),
            widget_height: widget_height.max(1),
        }
    }

    /// `None` when the slot lies outside the `u32` coordinate space.
    pub fn position_for(&self, index: usize) -> Option<GridPosition> {
        let index = u32::try_from(index).ok()?;
        let x = (index % self.columns).checked_mul(self.widget_width)?;
        let y = (index / self.columns).checked_mul(self.widget_height)?;
        // far edges must fit too, `overlaps` adds them
        x.checked_add(self.widget_width)?;
        y.checked_add(self.widget_height)?;
        Some(GridPosition {
            x,
            y,
            width: self.widget_width,
            height: self.widget_height,
        })
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::new(2, 6, 4)
    }
}
