use crate::errors::ConfigError;

use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    /// Resolves `requested` for `capability`, falling back to the first
    /// capable model and explaining why.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, ConfigError> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let (fallback_reason, requested_text) = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, capability) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            (
                Some(format!(
                    "Requested model '{requested_value}' unavailable for capability '{capability}'."
                )),
                Some(requested_value.to_string()),
            )
        } else {
            (Some("No model specified; using default.".to_string()), None)
        };

        let candidates = self.registry.by_capability(capability);
        let Some(model) = candidates.first().cloned() else {
            return Err(ConfigError::ModelUnavailable(format!(
                "No models available for capability '{capability}'."
            )));
        };
        Ok(ModelSelection {
            model,
            requested: requested_text,
            fallback_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use crate::errors::ConfigError;
    use crate::models::{
        ModelRegistry, ModelSelector, ModelSpec, CAPABILITY_GENERATE, CAPABILITY_REFINE,
        DEFAULT_GENERATE_MODEL, DEFAULT_REFINE_MODEL,
    };

    fn model(name: &str, capabilities: &[&str]) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: "google".to_string(),
            capabilities: capabilities.iter().map(|item| item.to_string()).collect(),
        }
    }

    #[test]
    fn default_registry_puts_spec_models_first() {
        let selector = ModelSelector::new(None);
        let generate = selector.select(None, CAPABILITY_GENERATE).unwrap();
        assert_eq!(generate.model.name, DEFAULT_GENERATE_MODEL);
        let refine = selector.select(None, CAPABILITY_REFINE).unwrap();
        assert_eq!(refine.model.name, DEFAULT_REFINE_MODEL);
    }

    #[test]
    fn explicit_model_is_honored() {
        let selection = ModelSelector::new(None)
            .select(Some("imagen-4.0-ultra-generate-001"), CAPABILITY_GENERATE)
            .unwrap();
        assert_eq!(selection.model.name, "imagen-4.0-ultra-generate-001");
        assert!(selection.fallback_reason.is_none());
    }

    #[test]
    fn falls_back_when_model_lacks_capability() {
        let selection = ModelSelector::new(None)
            .select(Some(DEFAULT_GENERATE_MODEL), CAPABILITY_REFINE)
            .unwrap();
        assert_eq!(selection.model.name, DEFAULT_REFINE_MODEL);
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'imagen-4.0-generate-001' unavailable for capability 'edit'.")
        );
    }

    #[test]
    fn provider_filter_keeps_only_matching_models() {
        let registry = ModelRegistry::new(None).by_provider("dryrun");
        let selection = ModelSelector::new(Some(registry))
            .select(None, CAPABILITY_GENERATE)
            .unwrap();
        assert_eq!(selection.model.provider, "dryrun");
    }

    #[test]
    fn errors_when_no_models_for_capability() {
        let mut models = IndexMap::new();
        models.insert("gen-only".to_string(), model("gen-only", &["image"]));
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("gen-only"), CAPABILITY_REFINE)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::ModelUnavailable(
                "No models available for capability 'edit'.".to_string()
            )
        );
    }
}
