pub mod config;
pub mod dryrun;
pub mod google;
pub mod session;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use autodesign_contracts::errors::{ConfigError, DesignError};
use autodesign_contracts::images::ImagePayload;
use autodesign_contracts::models::{
    ModelRegistry, ModelSelection, ModelSelector, CAPABILITY_GENERATE, CAPABILITY_REFINE,
};
use autodesign_contracts::session::AspectRatio;
use tracing::{debug, error, info, warn};

use crate::config::{ClientConfig, ProviderKind};
use crate::dryrun::DryrunModel;
use crate::google::GoogleModel;

pub use crate::session::{ActionOutcome, Completion, PendingRequest, Session};

pub const GENERATE_OUTPUT_MIME: &str = "image/jpeg";
pub const REFINE_RESPONSE_MODALITIES: [&str; 2] = ["IMAGE", "TEXT"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub number_of_images: u32,
    pub output_mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineRequest {
    pub model: String,
    pub image: ImagePayload,
    pub instruction: String,
}

/// One entry of a multimodal response, in the order the remote returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineImage(ImagePayload),
}

/// The remote generative-image capability.
pub trait DesignModel: Send + Sync {
    fn name(&self) -> &str;
    fn generate_images(&self, request: &GenerateRequest) -> Result<Vec<ImagePayload>>;
    fn refine_content(&self, request: &RefineRequest) -> Result<Vec<ContentPart>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    pub image: ImagePayload,
    pub caption: String,
}

/// Turns design intents into single remote exchanges and normalizes what comes back.
pub struct RequestClient {
    model: Box<dyn DesignModel>,
    generate_model: String,
    refine_model: String,
}

impl RequestClient {
    pub fn new(
        model: Box<dyn DesignModel>,
        generate_model: impl Into<String>,
        refine_model: impl Into<String>,
    ) -> Self {
        Self {
            model,
            generate_model: generate_model.into(),
            refine_model: refine_model.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let selector = ModelSelector::new(Some(
            ModelRegistry::new(None).by_provider(config.provider.as_str()),
        ));
        let generate = selector.select(config.generate_model.as_deref(), CAPABILITY_GENERATE)?;
        let refine = selector.select(config.refine_model.as_deref(), CAPABILITY_REFINE)?;
        log_model_selection("generate", &generate);
        log_model_selection("refine", &refine);

        let model: Box<dyn DesignModel> = match config.provider {
            ProviderKind::Google => {
                let api_key = config.require_api_key()?;
                let google = GoogleModel::new(api_key, &config.api_base, config.request_timeout)
                    .map_err(|err| ConfigError::InvalidSetting {
                        key: "http_client",
                        value: error_chain_text(&err, 256),
                    })?;
                Box::new(google)
            }
            ProviderKind::Dryrun => Box::new(DryrunModel::default()),
        };
        Ok(Self::new(model, generate.model.name, refine.model.name))
    }

    pub fn provider_name(&self) -> &str {
        self.model.name()
    }

    pub fn generate_model(&self) -> &str {
        &self.generate_model
    }

    pub fn refine_model(&self) -> &str {
        &self.refine_model
    }

    pub fn generate(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<ImagePayload, DesignError> {
        let request = GenerateRequest {
            model: self.generate_model.clone(),
            prompt: expand_generate_prompt(prompt),
            aspect_ratio,
            number_of_images: 1,
            output_mime_type: GENERATE_OUTPUT_MIME.to_string(),
        };
        debug!(
            provider = self.model.name(),
            model = %request.model,
            aspect_ratio = %aspect_ratio,
            "generate request"
        );
        let images = self.model.generate_images(&request).map_err(|err| {
            let detail = error_chain_text(&err, 1024);
            error!(provider = self.model.name(), %detail, "error generating image");
            DesignError::GenerationFailed { detail }
        })?;
        let Some(image) = images.into_iter().find(|image| !image.is_empty()) else {
            error!(provider = self.model.name(), "no images were generated");
            return Err(DesignError::GenerationFailed {
                detail: "No images were generated.".to_string(),
            });
        };
        info!(mime_type = image.mime_type(), bytes = image.len(), "image generated");
        Ok(image)
    }

    pub fn refine(
        &self,
        source: &ImagePayload,
        instruction: &str,
    ) -> Result<Refinement, DesignError> {
        let request = RefineRequest {
            model: self.refine_model.clone(),
            image: source.clone(),
            instruction: expand_refine_instruction(instruction),
        };
        debug!(
            provider = self.model.name(),
            model = %request.model,
            source_mime_type = source.mime_type(),
            source_bytes = source.len(),
            "refine request"
        );
        let parts = self.model.refine_content(&request).map_err(|err| {
            let detail = error_chain_text(&err, 1024);
            error!(provider = self.model.name(), %detail, "error refining image");
            DesignError::RefinementFailed { detail }
        })?;
        let Some(refinement) = select_refinement(parts) else {
            error!(provider = self.model.name(), "refinement returned no image part");
            return Err(DesignError::RefinementFailed {
                detail: "Image refinement did not produce a new image.".to_string(),
            });
        };
        info!(
            mime_type = refinement.image.mime_type(),
            bytes = refinement.image.len(),
            caption_chars = refinement.caption.chars().count(),
            "image refined"
        );
        Ok(refinement)
    }
}

pub fn expand_generate_prompt(prompt: &str) -> String {
    format!(
        "An ultra-realistic, high-resolution, professional photograph of the following car concept: {prompt}. Cinematic lighting, studio quality."
    )
}

pub fn expand_refine_instruction(instruction: &str) -> String {
    format!(
        "Refine the car design with this instruction: {instruction}. Maintain realism and photographic quality."
    )
}

/// Last text part becomes the caption and last image part the result.
/// Returns `None` when no image part is present or the last one is empty.
pub fn select_refinement(parts: Vec<ContentPart>) -> Option<Refinement> {
    let mut caption = String::new();
    let mut image = None;
    for part in parts {
        match part {
            ContentPart::Text(text) => caption = text,
            ContentPart::InlineImage(payload) => image = Some(payload),
        }
    }
    image
        .filter(|image| !image.is_empty())
        .map(|image| Refinement { image, caption })
}

fn log_model_selection(action: &str, selection: &ModelSelection) {
    match (&selection.fallback_reason, &selection.requested) {
        (Some(reason), Some(_)) => {
            warn!(action, model = %selection.model.name, "{reason}");
        }
        (Some(reason), None) => {
            debug!(action, model = %selection.model.name, "{reason}");
        }
        (None, _) => {
            debug!(action, model = %selection.model.name, "model selected");
        }
    }
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
