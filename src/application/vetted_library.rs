// Vetted SQL library - known-good queries used as the last-resort fallback
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct VettedSqlLibrary {
    templates: BTreeMap<String, String>,
}

impl VettedSqlLibrary {
    pub fn new(templates: BTreeMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn get_validated_sql(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(|sql| sql.trim())
    }

    /// Keys in sorted order
    pub fn list_validated_templates(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
