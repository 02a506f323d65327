use crate::application::catalog::WidgetCatalog;
use crate::application::vetted_library::VettedSqlLibrary;
use crate::domain::widget::{DashboardLayout, GridSpec, WidgetTemplate};
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;

const BUILTIN_WIDGETS: &str = include_str!("../../config/widgets.toml");
const BUILTIN_VETTED_SQL: &str = include_str!("../../config/vetted_sql.toml");

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub remote: RemoteSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteSettings {
    pub base_url: String,
    pub api_token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineSettings {
    pub max_fix_attempts: u32,
    pub validation_row_cap: usize,
    pub match_page_size: usize,
    pub min_keyword_overlap: usize,
    pub report_category: String,
    pub share_reports: bool,
    pub grid_columns: u32,
    pub widget_width: u32,
    pub widget_height: u32,
    pub widgets_path: Option<String>,
    pub vetted_sql_path: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_fix_attempts: 3,
            validation_row_cap: 10,
            match_page_size: 100,
            min_keyword_overlap: 2,
            report_category: "Dashboards".to_string(),
            share_reports: true,
            grid_columns: 2,
            widget_width: 6,
            widget_height: 4,
            widgets_path: None,
            vetted_sql_path: None,
        }
    }
}

impl EngineSettings {
    pub fn grid(&self) -> GridSpec {
        GridSpec::new(self.grid_columns, self.widget_width, self.widget_height)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    templates: Vec<WidgetTemplate>,
    #[serde(default)]
    layouts: Vec<DashboardLayout>,
}

#[derive(Debug, Deserialize)]
struct VettedSqlFile {
    #[serde(default)]
    templates: BTreeMap<String, String>,
}

/// Settings from `config/engine.toml` (optional) overridden by `PSA__*` environment variables
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/engine").required(false))
        .add_source(
            config::Environment::with_prefix("PSA")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings
        .try_deserialize()
        .context("invalid engine configuration (PSA__REMOTE__BASE_URL and PSA__REMOTE__API_TOKEN are required)")
}

pub fn parse_widget_catalog(text: &str) -> anyhow::Result<WidgetCatalog> {
    let file: CatalogFile = toml::from_str(text).context("failed to parse widget catalog")?;
    Ok(WidgetCatalog::new(file.templates, file.layouts)?)
}

pub fn parse_vetted_library(text: &str) -> anyhow::Result<VettedSqlLibrary> {
    let file: VettedSqlFile = toml::from_str(text).context("failed to parse vetted SQL library")?;
    Ok(VettedSqlLibrary::new(file.templates))
}

pub fn builtin_widget_catalog() -> anyhow::Result<WidgetCatalog> {
    parse_widget_catalog(BUILTIN_WIDGETS)
}

pub fn builtin_vetted_library() -> anyhow::Result<VettedSqlLibrary> {
    parse_vetted_library(BUILTIN_VETTED_SQL)
}

/// Catalog from `path` when configured, otherwise the built-in one
pub fn load_widget_catalog(path: Option<&str>) -> anyhow::Result<WidgetCatalog> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read widget catalog {}", path))?;
            parse_widget_catalog(&text)
        }
        None => builtin_widget_catalog(),
    }
}

pub fn load_vetted_library(path: Option<&str>) -> anyhow::Result<VettedSqlLibrary> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read vetted SQL library {}", path))?;
            parse_vetted_library(&text)
        }
        None => builtin_vetted_library(),
    }
}
