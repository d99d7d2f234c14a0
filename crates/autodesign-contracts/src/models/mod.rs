mod registry;
mod selectors;

pub use registry::{
    ModelRegistry, ModelSpec, CAPABILITY_GENERATE, CAPABILITY_REFINE, DEFAULT_GENERATE_MODEL,
    DEFAULT_REFINE_MODEL, DRYRUN_MODEL,
};
pub use selectors::{ModelSelection, ModelSelector};
