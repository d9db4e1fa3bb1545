//! Catalog listing

use crate::output::{gb, Formattable, OutputFormatter};
use anyhow::Result;
use mrm_core::{Config, ModelMetadata, Precision};
use serde::Serialize;

/// One catalog entry with its priority and smallest footprint
#[derive(Debug, Serialize)]
struct CatalogEntry {
    id: String,
    name: String,
    model_type: String,
    priority: i32,
    size_gb: f64,
    min_footprint_gb: f64,
}

impl CatalogEntry {
    fn new(model: &ModelMetadata, config: &Config) -> Self {
        Self {
            id: model.id.clone(),
            name: model.name.clone(),
            model_type: model.model_type.to_string(),
            priority: config.priorities.get(model.model_type),
            size_gb: model.size_gb,
            min_footprint_gb: model.size_gb * Precision::lowest().footprint_factor(),
        }
    }
}

impl Formattable for CatalogEntry {
    fn table_headers() -> Vec<String> {
        ["Id", "Name", "Type", "Priority", "Size", "Min footprint"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.model_type.clone(),
            self.priority.to_string(),
            gb(self.size_gb),
            gb(self.min_footprint_gb),
        ]
    }

    fn key_value_pairs(&self) -> Vec<(String, String)> {
        Self::table_headers()
            .into_iter()
            .zip(self.table_row())
            .collect()
    }
}

/// List the configured catalog, highest priority first
pub fn list_catalog(config: &Config, formatter: &OutputFormatter) -> Result<()> {
    let mut entries: Vec<CatalogEntry> = config
        .catalog
        .iter()
        .map(|m| CatalogEntry::new(m, config))
        .collect();
    entries.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    formatter.print_list(&entries)
}
