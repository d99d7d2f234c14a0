use indexmap::IndexMap;

pub const CAPABILITY_GENERATE: &str = "image";
pub const CAPABILITY_REFINE: &str = "edit";

pub const DEFAULT_GENERATE_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_REFINE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DRYRUN_MODEL: &str = "dryrun-image-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    /// Capable models in registration order.
    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn by_provider(&self, provider: &str) -> ModelRegistry {
        ModelRegistry::new(Some(
            self.models
                .iter()
                .filter(|(_, model)| model.provider == provider)
                .map(|(name, model)| (name.clone(), model.clone()))
                .collect(),
        ))
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert(DEFAULT_GENERATE_MODEL, "google", &[CAPABILITY_GENERATE]);
    insert("imagen-4.0-ultra-generate-001", "google", &[CAPABILITY_GENERATE]);
    insert("imagen-4.0-fast-generate-001", "google", &[CAPABILITY_GENERATE]);
    insert(DEFAULT_REFINE_MODEL, "google", &[CAPABILITY_REFINE]);
    insert("gemini-2.5-flash-image", "google", &[CAPABILITY_REFINE]);
    insert(
        DRYRUN_MODEL,
        "dryrun",
        &[CAPABILITY_GENERATE, CAPABILITY_REFINE],
    );

    map
}
