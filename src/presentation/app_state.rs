// Application state for tool handlers
use crate::application::auto_fix::AutoFixer;
use crate::application::catalog::WidgetCatalog;
use crate::application::dashboard_builder::DashboardBuilder;
use crate::application::psa_repository::PsaRepository;
use crate::application::report_matcher::ReportMatcher;
use crate::application::report_service::ReportService;
use crate::application::sql_validator::SqlValidator;
use crate::application::vetted_library::VettedSqlLibrary;
use crate::infrastructure::config::EngineSettings;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn PsaRepository>,
    pub catalog: Arc<WidgetCatalog>,
    pub vetted: Arc<VettedSqlLibrary>,
    pub matcher: ReportMatcher,
    pub validator: SqlValidator,
    pub fixer: AutoFixer,
    pub report_service: ReportService,
    pub dashboard_builder: DashboardBuilder,
    pub max_fix_attempts: u32,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn PsaRepository>,
        catalog: Arc<WidgetCatalog>,
        vetted: Arc<VettedSqlLibrary>,
        engine: &EngineSettings,
    ) -> Self {
        let validator = SqlValidator::new(repository.clone(), engine.validation_row_cap);
        let fixer = AutoFixer::new(repository.clone(), validator.clone());
        let matcher = ReportMatcher::new(
            repository.clone(),
            engine.match_page_size,
            engine.min_keyword_overlap,
        );
        let report_service = ReportService::new(
            repository.clone(),
            fixer.clone(),
            vetted.clone(),
            engine.report_category.clone(),
            engine.share_reports,
            engine.max_fix_attempts,
        );
        let dashboard_builder = DashboardBuilder::new(
            repository.clone(),
            catalog.clone(),
            matcher.clone(),
            fixer.clone(),
            report_service.clone(),
            engine.grid(),
            engine.max_fix_attempts,
        );

        Self {
            repository,
            catalog,
            vetted,
            matcher,
            validator,
            fixer,
            report_service,
            dashboard_builder,
            max_fix_attempts: engine.max_fix_attempts,
        }
    }
}
