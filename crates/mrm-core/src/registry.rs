//! In-memory model catalog

use crate::{Error, ModelMetadata, ModelRegistry, Result};
use std::collections::BTreeMap;

/// Registry built once from a static catalog
#[derive(Debug, Clone, Default)]
pub struct StaticModelRegistry {
    models: BTreeMap<String, ModelMetadata>,
}

impl StaticModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from catalog entries, rejecting invalid or duplicate ones
    pub fn from_entries(entries: impl IntoIterator<Item = ModelMetadata>) -> Result<Self> {
        let mut registry = Self::new();
        for entry in entries {
            registry.insert(entry)?;
        }
        Ok(registry)
    }

    /// Add one entry
    pub fn insert(&mut self, metadata: ModelMetadata) -> Result<()> {
        metadata.validate()?;
        if self.models.contains_key(&metadata.id) {
            return Err(Error::already_exists(format!(
                "model {} is already registered",
                metadata.id
            )));
        }
        self.models.insert(metadata.id.clone(), metadata);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelRegistry for StaticModelRegistry {
    fn get(&self, model_id: &str) -> Option<ModelMetadata> {
        self.models.get(model_id).cloned()
    }

    fn list(&self) -> Vec<ModelMetadata> {
        self.models.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelType;

    fn catalog() -> Vec<ModelMetadata> {
        vec![
            ModelMetadata::new("sd-model", "Stable Diffusion", 8.0, ModelType::TextToImage),
            ModelMetadata::new("llm-7b", "LLM 7B", 10.0, ModelType::Llm),
        ]
    }

    #[test]
    fn test_lookup() {
        let registry = StaticModelRegistry::from_entries(catalog()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("llm-7b").unwrap().size_gb, 10.0);
        assert!(registry.get("missing").is_none());
        assert!(registry.contains("sd-model"));
    }

    #[test]
    fn test_list_is_sorted() {
        let registry = StaticModelRegistry::from_entries(catalog()).unwrap();
        let ids: Vec<_> = registry.list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["llm-7b", "sd-model"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut entries = catalog();
        entries.push(ModelMetadata::new("llm-7b", "Again", 4.0, ModelType::Llm));
        let err = StaticModelRegistry::from_entries(entries).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn test_invalid_size_rejected() {
        let mut registry = StaticModelRegistry::new();
        let err = registry
            .insert(ModelMetadata::new("bad", "Bad", -2.0, ModelType::Tts))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(registry.is_empty());
    }
}
