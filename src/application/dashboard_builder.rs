// Dashboard builder - use case for assembling dashboards from catalog widgets
use crate::application::auto_fix::AutoFixer;
use crate::application::catalog::WidgetCatalog;
use crate::application::errors::EngineError;
use crate::application::psa_repository::PsaRepository;
use crate::application::report_matcher::ReportMatcher;
use crate::application::report_service::{ReportRequest, ReportService};
use crate::domain::dashboard::{
    DashboardBuildResult, NewWidget, WidgetOutcome, WidgetSource, WidgetStatus,
};
use crate::domain::matching::keyword_overlap;
use crate::domain::report::SchemaCatalog;
use crate::domain::widget::{GridPosition, GridSpec, WidgetTemplate};
use serde::Deserialize;
use std::sync::Arc;

/// Either a layout name or an explicit, ordered list of widget template names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WidgetSelection {
    Layout(String),
    Widgets(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolvedWidget {
    source: WidgetSource,
    status: WidgetStatus,
    used_fallback: bool,
}

enum Slot<'a> {
    Failed(WidgetOutcome),
    Ready(&'a WidgetTemplate, ResolvedWidget),
}

#[derive(Clone)]
pub struct DashboardBuilder {
    repository: Arc<dyn PsaRepository>,
    catalog: Arc<WidgetCatalog>,
    matcher: ReportMatcher,
    fixer: AutoFixer,
    reports: ReportService,
    grid: GridSpec,
    max_fix_attempts: u32,
}

impl DashboardBuilder {
    pub fn new(
        repository: Arc<dyn PsaRepository>,
        catalog: Arc<WidgetCatalog>,
        matcher: ReportMatcher,
        fixer: AutoFixer,
        reports: ReportService,
        grid: GridSpec,
        max_fix_attempts: u32,
    ) -> Self {
        Self {
            repository,
            catalog,
            matcher,
            fixer,
            reports,
            grid,
            max_fix_attempts,
        }
    }

    /// Build a dashboard widget by widget, in order.
    ///
    /// Per-widget failures are recorded in the result. Only an unknown layout,
    /// an empty request, or a failure to create the dashboard itself is an error.
    pub async fn build_dashboard(
        &self,
        name: &str,
        selection: &WidgetSelection,
        description: &str,
    ) -> Result<DashboardBuildResult, EngineError> {
        let widget_names = self.resolve_selection(selection)?;
        let schema = self.fetch_schema().await;

        let mut slots = Vec::with_capacity(widget_names.len());
        for widget_name in &widget_names {
            let Some(template) = self.catalog.get_template(widget_name) else {
                slots.push(Slot::Failed(WidgetOutcome::failed(
                    widget_name.as_str(),
                    format!("unknown widget template '{}'", widget_name),
                )));
                continue;
            };
            match self.resolve_widget(template, schema.as_ref()).await {
                Ok(resolved) => slots.push(Slot::Ready(template, resolved)),
                Err(error) => {
                    tracing::warn!("Widget {} could not be resolved: {}", widget_name, error);
                    slots.push(Slot::Failed(WidgetOutcome::failed(widget_name.as_str(), error)));
                }
            }
        }

        let mut result = DashboardBuildResult::default();
        if !slots.iter().any(|s| matches!(s, Slot::Ready(..))) {
            result.errors.push("no widgets could be resolved; dashboard was not created".to_string());
            result.widget_results = slots
                .into_iter()
                .filter_map(|s| match s {
                    Slot::Failed(outcome) => Some(outcome),
                    Slot::Ready(..) => None,
                })
                .collect();
            return Ok(result);
        }

        let dashboard_id = self
            .repository
            .create_dashboard(name, description)
            .await
            .map_err(|e| {
                tracing::error!("Dashboard '{}' could not be created: {}", name, e);
                EngineError::DashboardCreation(e)
            })?;
        result.dashboard_id = Some(dashboard_id);

        for (index, slot) in slots.into_iter().enumerate() {
            let outcome = match slot {
                Slot::Failed(outcome) => outcome,
                Slot::Ready(template, resolved) => match self.grid.position_for(index) {
                    Some(position) => self.attach(dashboard_id, template, resolved, position).await,
                    None => WidgetOutcome::failed(template.name.as_str(), format!("no grid position for slot {}", index)),
                },
            };
            result.widget_results.push(outcome);
        }

        tracing::info!(
            "Built dashboard '{}' ({}): {}/{} widgets attached",
            name,
            dashboard_id,
            result.succeeded_count(),
            result.widget_results.len()
        );
        Ok(result)
    }

    /// Resolve one template and attach it to an existing dashboard at `slot`.
    pub async fn add_widget_to_dashboard(
        &self,
        dashboard_id: i64,
        widget_name: &str,
        slot: usize,
    ) -> Result<WidgetOutcome, EngineError> {
        let template = self
            .catalog
            .get_template(widget_name)
            .ok_or_else(|| EngineError::TemplateNotFound { name: widget_name.to_string() })?;
        let position = self
            .grid
            .position_for(slot)
            .ok_or(EngineError::SlotOutOfRange { slot })?;
        let schema = self.fetch_schema().await;

        match self.resolve_widget(template, schema.as_ref()).await {
            Ok(resolved) => Ok(self.attach(dashboard_id, template, resolved, position).await),
            Err(error) => Ok(WidgetOutcome::failed(widget_name, error)),
        }
    }

    /// Every catalog template, ranked by keyword overlap with free text.
    /// Ties keep catalog declaration order, so unrelated templates trail in that order.
    pub fn suggest_widgets_for_description(&self, text: &str) -> Vec<String> {
        let mut scored: Vec<(usize, &WidgetTemplate)> = self
            .catalog
            .templates()
            .iter()
            .map(|t| (keyword_overlap(&t.match_keywords(), text), t))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, t)| t.name.clone()).collect()
    }

    fn resolve_selection(&self, selection: &WidgetSelection) -> Result<Vec<String>, EngineError> {
        let names = match selection {
            WidgetSelection::Layout(name) => match self.catalog.get_layout(name) {
                Some(widgets) => widgets.to_vec(),
                None if self.catalog.get_template(name).is_some() => vec![name.clone()],
                None => return Err(EngineError::LayoutNotFound { name: name.clone() }),
            },
            WidgetSelection::Widgets(names) => names.clone(),
        };
        if names.is_empty() {
            return Err(EngineError::NoWidgetsRequested);
        }
        Ok(names)
    }

    async fn fetch_schema(&self) -> Option<SchemaCatalog> {
        match self.repository.list_schema().await {
            Ok(schema) => Some(schema),
            Err(e) => {
                tracing::debug!("Schema introspection unavailable: {}", e);
                None
            }
        }
    }

    /// Find, repair or create the report behind a widget.
    async fn resolve_widget(
        &self,
        template: &WidgetTemplate,
        schema: Option<&SchemaCatalog>,
    ) -> Result<ResolvedWidget, String> {
        let Some(request) = ReportRequest::from_template(template) else {
            let filter_id = template
                .filter_id
                .ok_or_else(|| format!("widget '{}' has no report SQL or filter", template.name))?;
            return Ok(ResolvedWidget {
                source: WidgetSource::Filter(filter_id),
                status: WidgetStatus::Created,
                used_fallback: false,
            });
        };

        match self.matcher.find_matching_report(&template.match_keywords()).await {
            Ok(Some(report)) => {
                tracing::debug!("Widget {} matched existing report {} '{}'", template.name, report.id, report.name);
                let outcome = self
                    .fixer
                    .validate_and_fix_report(report.id, self.max_fix_attempts, schema)
                    .await;
                if outcome.is_valid() {
                    return Ok(ResolvedWidget {
                        source: WidgetSource::Report(report.id),
                        status: WidgetStatus::Reused,
                        used_fallback: false,
                    });
                }
                tracing::debug!(
                    "Matched report {} could not be repaired; creating a new one for {}",
                    report.id,
                    template.name
                );
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Report search failed for {}: {}", template.name, e),
        }

        let created = self.reports.create_validated_report(request, schema).await;
        match (created.success, created.report_id) {
            (true, Some(report_id)) if created.validated => Ok(ResolvedWidget {
                source: WidgetSource::Report(report_id),
                status: WidgetStatus::Created,
                used_fallback: created.used_fallback,
            }),
            _ => Err(created
                .error
                .unwrap_or_else(|| "report could not be validated".to_string())),
        }
    }

    async fn attach(
        &self,
        dashboard_id: i64,
        template: &WidgetTemplate,
        resolved: ResolvedWidget,
        position: GridPosition,
    ) -> WidgetOutcome {
        let widget = NewWidget {
            dashboard_id,
            title: template.display_name.clone(),
            kind: template.kind,
            source: resolved.source,
            position,
            colour: template.colour.clone(),
            chart_axis: template.chart_axis.clone().filter(|_| template.kind.is_chart()),
        };

        let (report_id, filter_id) = match resolved.source {
            WidgetSource::Report(id) => (Some(id), None),
            WidgetSource::Filter(id) => (None, Some(id)),
        };

        match self.repository.add_widget(widget).await {
            Ok(widget_id) => WidgetOutcome {
                widget_name: template.name.clone(),
                report_id,
                filter_id,
                widget_id: Some(widget_id),
                status: resolved.status,
                used_fallback: resolved.used_fallback,
                position: Some(position),
                error: None,
            },
            Err(e) => {
                tracing::warn!("Adding widget {} to dashboard {} failed: {}", template.name, dashboard_id, e);
                WidgetOutcome {
                    report_id,
                    filter_id,
                    ..WidgetOutcome::failed(template.name.as_str(), e.user_message())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fake_psa::{halo_schema, FakePsa};
    use crate::application::sql_validator::SqlValidator;
    use crate::application::vetted_library::VettedSqlLibrary;
    use crate::infrastructure::config::{builtin_vetted_library, builtin_widget_catalog};

    fn builder_with(psa: &Arc<FakePsa>, vetted: VettedSqlLibrary) -> DashboardBuilder {
        let catalog = Arc::new(builtin_widget_catalog().unwrap());
        let fixer = AutoFixer::new(psa.clone(), SqlValidator::new(psa.clone(), 10));
        let reports = ReportService::new(
            psa.clone(),
            fixer.clone(),
            Arc::new(vetted),
            "Dashboards".to_string(),
            true,
            3,
        );
        DashboardBuilder::new(
            psa.clone(),
            catalog,
            ReportMatcher::new(psa.clone(), 100, 2),
            fixer,
            reports,
            GridSpec::new(2, 6, 4),
            3,
        )
    }

    fn builder(psa: &Arc<FakePsa>) -> DashboardBuilder {
        builder_with(psa, builtin_vetted_library().unwrap())
    }

    fn layout(name: &str) -> WidgetSelection {
        WidgetSelection::Layout(name.to_string())
    }

    #[tokio::test]
    async fn test_minimal_layout_on_empty_system() {
        let psa = Arc::new(FakePsa::new());
        let result = builder(&psa)
            .build_dashboard("Ops Overview", &layout("minimal"), "Daily ops")
            .await
            .unwrap();

        let names: Vec<&str> = result.widget_results.iter().map(|w| w.widget_name.as_str()).collect();
        assert_eq!(names, vec!["open_tickets", "unassigned_tickets", "tickets_by_priority", "agent_workload"]);
        for widget in &result.widget_results {
            assert_eq!(widget.status, WidgetStatus::Created, "{:?}", widget);
            assert!(widget.error.is_none());
        }
        assert!(result.dashboard_id.is_some());
        assert!(result.errors.is_empty());
        assert_eq!(psa.dashboards(), vec![(result.dashboard_id.unwrap(), "Ops Overview".to_string())]);
        assert_eq!(psa.widgets().len(), 4);
        assert_eq!(psa.report_count(), 2);
    }

    #[tokio::test]
    async fn test_names_resolve_regardless_of_case() {
        let psa = Arc::new(FakePsa::new());
        let builder = builder(&psa);

        let result = builder.build_dashboard("Open", &layout("Open_Tickets"), "").await.unwrap();
        assert_eq!(result.widget_results.len(), 1);
        assert!(result.widget_results[0].succeeded(), "{:?}", result.widget_results);

        let selection = WidgetSelection::Widgets(vec!["TICKETS_BY_PRIORITY".to_string()]);
        let result = builder.build_dashboard("Priorities", &selection, "").await.unwrap();
        assert!(result.widget_results[0].succeeded(), "{:?}", result.widget_results);

        let outcome = builder.add_widget_to_dashboard(1, "Open_Tickets", 0).await.unwrap();
        assert!(outcome.succeeded());
    }

    #[tokio::test]
    async fn test_every_layout_widget_is_placed_without_overlap() {
        let psa = Arc::new(FakePsa::new());
        let builder = builder(&psa);
        let result = builder.build_dashboard("Everything", &layout("full"), "").await.unwrap();

        assert!(result.widget_results.iter().all(|w| w.succeeded()), "{:?}", result.widget_results);
        let positions: Vec<_> = result.widget_results.iter().filter_map(|w| w.position).collect();
        assert_eq!(positions.len(), result.widget_results.len());
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[tokio::test]
    async fn test_reuses_matching_report() {
        let psa = Arc::new(FakePsa::new());
        let existing = psa.seed_report(
            "Tickets by Priority",
            "open tickets grouped by priority",
            "SELECT Seriousness, COUNT(*) FROM FAULTS GROUP BY Seriousness",
            5,
        );
        let selection = WidgetSelection::Widgets(vec!["tickets_by_priority".to_string()]);
        let result = builder(&psa).build_dashboard("Priorities", &selection, "").await.unwrap();

        let widget = &result.widget_results[0];
        assert_eq!(widget.status, WidgetStatus::Reused);
        assert_eq!(widget.report_id, Some(existing));
        assert_eq!(psa.report_count(), 1);
    }

    #[tokio::test]
    async fn test_repairs_matching_report_before_use() {
        let psa = Arc::new(FakePsa::new());
        let existing = psa.seed_report(
            "Agent workload",
            "tickets assigned per agent",
            "SELECT uname, COUNT(*) FROM AGENTS GROUP BY uname",
            5,
        );
        let selection = WidgetSelection::Widgets(vec!["agent_workload".to_string()]);
        let result = builder(&psa).build_dashboard("Team", &selection, "").await.unwrap();

        assert_eq!(result.widget_results[0].status, WidgetStatus::Reused);
        assert_eq!(result.widget_results[0].report_id, Some(existing));
        assert_eq!(psa.report(existing).unwrap().sql_query, "SELECT uname, COUNT(*) FROM UNAME GROUP BY uname");
    }

    #[tokio::test]
    async fn test_unrepairable_match_falls_back_to_new_report() {
        let psa = Arc::new(FakePsa::new());
        let existing = psa.seed_report(
            "Agent workload",
            "tickets assigned per agent",
            "SELECT uname FROM LEGACY_WORKLOAD",
            5,
        );
        let selection = WidgetSelection::Widgets(vec!["agent_workload".to_string()]);
        let result = builder(&psa).build_dashboard("Team", &selection, "").await.unwrap();

        let widget = &result.widget_results[0];
        assert_eq!(widget.status, WidgetStatus::Created);
        assert_ne!(widget.report_id, Some(existing));
    }

    #[tokio::test]
    async fn test_broken_template_uses_vetted_fallback() {
        let catalog = builtin_widget_catalog().unwrap();
        let sql = catalog.get_template("tickets_by_priority").unwrap().sql_template.clone().unwrap();
        let psa = Arc::new(FakePsa::new().with_broken_sql(&sql));
        let selection = WidgetSelection::Widgets(vec!["tickets_by_priority".to_string()]);
        let result = builder(&psa).build_dashboard("Priorities", &selection, "").await.unwrap();

        let widget = &result.widget_results[0];
        assert_eq!(widget.status, WidgetStatus::Created);
        assert!(widget.used_fallback);
    }

    #[tokio::test]
    async fn test_widget_failures_do_not_abort_build() {
        let catalog = builtin_widget_catalog().unwrap();
        let sql = catalog.get_template("agent_workload").unwrap().sql_template.clone().unwrap();
        let psa = Arc::new(FakePsa::new().with_broken_sql(&sql));
        let result = builder_with(&psa, VettedSqlLibrary::default())
            .build_dashboard("Ops Overview", &layout("minimal"), "")
            .await
            .unwrap();

        assert_eq!(result.widget_results.len(), 4);
        let failed = &result.widget_results[3];
        assert_eq!(failed.status, WidgetStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("Query execution failed."));
        assert_eq!(result.succeeded_count(), 3);
        assert!(result.dashboard_id.is_some());
        assert_eq!(psa.widgets().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_widget_names_are_recorded() {
        let psa = Arc::new(FakePsa::new());
        let selection = WidgetSelection::Widgets(vec!["open_tickets".to_string(), "ghost".to_string()]);
        let result = builder(&psa).build_dashboard("Mixed", &selection, "").await.unwrap();

        assert_eq!(result.widget_results[1].status, WidgetStatus::Failed);
        assert_eq!(result.widget_results[1].error.as_deref(), Some("unknown widget template 'ghost'"));
        assert_eq!(result.succeeded_count(), 1);
    }

    #[tokio::test]
    async fn test_nothing_resolved_skips_dashboard_creation() {
        let psa = Arc::new(FakePsa::new());
        let selection = WidgetSelection::Widgets(vec!["ghost".to_string()]);
        let result = builder(&psa).build_dashboard("Empty", &selection, "").await.unwrap();

        assert!(result.dashboard_id.is_none());
        assert_eq!(result.errors.len(), 1);
        assert!(psa.dashboards().is_empty());
    }

    #[tokio::test]
    async fn test_build_level_errors() {
        let psa = Arc::new(FakePsa::new());
        let err = builder(&psa).build_dashboard("X", &layout("nope"), "").await.unwrap_err();
        assert!(matches!(err, EngineError::LayoutNotFound { .. }));

        let err = builder(&psa)
            .build_dashboard("X", &WidgetSelection::Widgets(vec![]), "")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoWidgetsRequested));

        let failing = Arc::new(FakePsa::new().failing_dashboard_creation());
        let err = builder(&failing).build_dashboard("X", &layout("minimal"), "").await.unwrap_err();
        assert!(matches!(err, EngineError::DashboardCreation(_)));
    }

    #[tokio::test]
    async fn test_widget_attach_failure_is_per_widget() {
        let psa = Arc::new(FakePsa::new().failing_widgets());
        let result = builder(&psa).build_dashboard("Ops", &layout("minimal"), "").await.unwrap();

        assert!(result.dashboard_id.is_some());
        assert!(result.widget_results.iter().all(|w| w.status == WidgetStatus::Failed));
        assert!(result.widget_results[2].report_id.is_some());
    }

    #[tokio::test]
    async fn test_single_template_name_as_selection() {
        let psa = Arc::new(FakePsa::new());
        let result = builder(&psa).build_dashboard("One", &layout("open_tickets"), "").await.unwrap();
        assert_eq!(result.widget_results.len(), 1);
        assert_eq!(result.widget_results[0].filter_id, Some(1));
    }

    #[tokio::test]
    async fn test_add_widget_to_existing_dashboard() {
        let psa = Arc::new(FakePsa::new().with_schema(halo_schema()));
        let builder = builder(&psa);
        let outcome = builder.add_widget_to_dashboard(42, "sla_breaches", 5).await.unwrap();

        assert_eq!(outcome.status, WidgetStatus::Created);
        assert_eq!(outcome.position, GridSpec::new(2, 6, 4).position_for(5));
        assert_eq!(psa.widgets()[0].dashboard_id, 42);

        let err = builder.add_widget_to_dashboard(42, "ghost", 0).await.unwrap_err();
        assert!(matches!(err, EngineError::TemplateNotFound { .. }));
    }

    #[tokio::test]
    async fn test_out_of_range_slot_is_rejected_before_any_remote_write() {
        let psa = Arc::new(FakePsa::new());
        let builder = builder(&psa);

        let err = builder
            .add_widget_to_dashboard(1, "tickets_by_priority", 3_000_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SlotOutOfRange { slot: 3_000_000_000 }));
        assert_eq!(psa.report_count(), 0);
        assert!(psa.widgets().is_empty());

        let err = builder.add_widget_to_dashboard(1, "open_tickets", usize::MAX).await.unwrap_err();
        assert!(matches!(err, EngineError::SlotOutOfRange { .. }));
    }

    #[test]
    fn test_suggest_sla_and_response_time_first() {
        let psa = Arc::new(FakePsa::new());
        let suggestions = builder(&psa).suggest_widgets_for_description("sla breaches and response time");

        assert!(suggestions.len() >= 2);
        let mut top: Vec<&str> = suggestions[..2].iter().map(String::as_str).collect();
        top.sort_unstable();
        assert_eq!(top, vec!["response_time", "sla_breaches"]);
    }

    #[test]
    fn test_suggest_ties_follow_catalog_order() {
        let psa = Arc::new(FakePsa::new());
        let builder = builder(&psa);
        let catalog_order: Vec<String> = builder.catalog.templates().iter().map(|t| t.name.clone()).collect();

        let suggestions = builder.suggest_widgets_for_description("status");
        assert_eq!(suggestions.len(), catalog_order.len());
        assert_eq!(suggestions[0], "tickets_by_status");
        let rest: Vec<&String> = catalog_order.iter().filter(|n| *n != "tickets_by_status").collect();
        assert_eq!(suggestions[1..].iter().collect::<Vec<_>>(), rest);

        assert_eq!(builder.suggest_widgets_for_description("weather forecast"), catalog_order);
    }

    #[test]
    fn test_suggest_does_not_match_inside_words() {
        let psa = Arc::new(FakePsa::new());
        let builder = builder(&psa);
        let catalog_order: Vec<String> = builder.catalog.templates().iter().map(|t| t.name.clone()).collect();
        assert_eq!(builder.suggest_widgets_for_description("translate invoices"), catalog_order);
    }

    #[test]
    fn test_selection_deserializes_from_string_or_list() {
        let layout: WidgetSelection = serde_json::from_str("\"minimal\"").unwrap();
        assert_eq!(layout, WidgetSelection::Layout("minimal".to_string()));
        let list: WidgetSelection = serde_json::from_str("[\"open_tickets\"]").unwrap();
        assert_eq!(list, WidgetSelection::Widgets(vec!["open_tickets".to_string()]));
    }
}
