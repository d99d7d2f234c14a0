use thiserror::Error;

pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to generate image. Please check your prompt and API key.";
pub const REFINEMENT_FAILED_MESSAGE: &str =
    "Failed to refine image. The model may not have been able to fulfill the request.";
pub const UPLOAD_FAILED_MESSAGE: &str = "Failed to process image file.";

/// Per-action failures. `Display` is the user-facing message; `detail` keeps
/// the flattened cause chain for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignError {
    #[error("Failed to generate image. Please check your prompt and API key.")]
    GenerationFailed { detail: String },

    #[error("Failed to refine image. The model may not have been able to fulfill the request.")]
    RefinementFailed { detail: String },

    #[error("Failed to process image file.")]
    UploadDecodeFailed { detail: String },
}

impl DesignError {
    pub fn detail(&self) -> &str {
        match self {
            Self::GenerationFailed { detail }
            | Self::RefinementFailed { detail }
            | Self::UploadDecodeFailed { detail } => detail,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::GenerationFailed { .. } => "generation_failed",
            Self::RefinementFailed { .. } => "refinement_failed",
            Self::UploadDecodeFailed { .. } => "upload_decode_failed",
        }
    }
}

/// Startup failures; these abort initialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("API_KEY environment variable not set")]
    MissingCredential,

    #[error("invalid {key}: '{value}'")]
    InvalidSetting { key: &'static str, value: String },

    #[error("{0}")]
    ModelUnavailable(String),
}
