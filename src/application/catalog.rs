// Widget template catalog and named dashboard layouts
use crate::domain::widget::{DashboardLayout, WidgetTemplate};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate widget template '{0}'")]
    DuplicateTemplate(String),

    #[error("duplicate layout '{0}'")]
    DuplicateLayout(String),

    #[error("layout '{layout}' references unknown widget template '{widget}'")]
    UnknownLayoutWidget { layout: String, widget: String },

    #[error("widget template '{0}' has neither SQL nor a usable filter")]
    MissingBacking(String),
}

/// Immutable catalog built once at start-up and shared by reference.
#[derive(Debug, Clone)]
pub struct WidgetCatalog {
    templates: Vec<WidgetTemplate>,
    layouts: Vec<DashboardLayout>,
}

impl WidgetCatalog {
    pub fn new(
        templates: Vec<WidgetTemplate>,
        layouts: Vec<DashboardLayout>,
    ) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        for template in &templates {
            if !names.insert(template.name.to_ascii_lowercase()) {
                return Err(CatalogError::DuplicateTemplate(template.name.clone()));
            }
            if template.is_filter_backed()
                && (template.filter_id.is_none() || template.kind.needs_report())
            {
                return Err(CatalogError::MissingBacking(template.name.clone()));
            }
        }

        let mut layout_names = HashSet::new();
        for layout in &layouts {
            if !layout_names.insert(layout.name.to_ascii_lowercase()) {
                return Err(CatalogError::DuplicateLayout(layout.name.clone()));
            }
            if let Some(widget) = layout.widgets.iter().find(|w| !names.contains(&w.to_ascii_lowercase())) {
                return Err(CatalogError::UnknownLayoutWidget {
                    layout: layout.name.clone(),
                    widget: widget.clone(),
                });
            }
        }

        Ok(Self { templates, layouts })
    }

    /// Template and layout names are matched case-insensitively.
    pub fn get_template(&self, name: &str) -> Option<&WidgetTemplate> {
        self.templates.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn get_layout(&self, name: &str) -> Option<&[String]> {
        self.layouts
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .map(|l| l.widgets.as_slice())
    }

    /// Templates in declaration order
    pub fn templates(&self) -> &[WidgetTemplate] {
        &self.templates
    }

    pub fn layouts(&self) -> &[DashboardLayout] {
        &self.layouts
    }
}
