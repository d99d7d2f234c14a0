use std::time::Duration;

use anyhow::{bail, Context, Result};
use autodesign_contracts::images::ImagePayload;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::{
    truncate_text, ContentPart, DesignModel, GenerateRequest, RefineRequest,
    REFINE_RESPONSE_MODALITIES,
};

/// Imagen (`:predict`) for generation and Gemini (`:generateContent`) for
/// refinement, both on the Generative Language REST API.
pub struct GoogleModel {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl GoogleModel {
    pub fn new(api_key: &str, api_base: &str, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            http,
        })
    }

    fn model_path(model: &str) -> String {
        let trimmed = model.trim();
        if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        }
    }

    fn predict_endpoint(&self, model: &str) -> String {
        format!("{}/{}:predict", self.api_base, Self::model_path(model))
    }

    fn generate_content_endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.api_base, Self::model_path(model))
    }

    fn post(&self, label: &str, endpoint: &str, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(payload)
            .send()
            .with_context(|| format!("{label} request failed ({endpoint})"))?;
        response_json_or_error(label, response)
    }

    pub(crate) fn predict_payload(request: &GenerateRequest) -> Value {
        json!({
            "instances": [{
                "prompt": request.prompt,
            }],
            "parameters": {
                "sampleCount": request.number_of_images.max(1),
                "aspectRatio": request.aspect_ratio.as_str(),
                "outputOptions": {
                    "mimeType": request.output_mime_type,
                },
            },
        })
    }

    pub(crate) fn generate_content_payload(request: &RefineRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": request.image.mime_type(),
                            "data": request.image.to_base64(),
                        }
                    },
                    { "text": request.instruction },
                ],
            }],
            "generationConfig": {
                "responseModalities": REFINE_RESPONSE_MODALITIES,
            },
        })
    }

    /// Images from `predictions[]`, in response order.
    pub(crate) fn extract_predictions(
        response_payload: &Value,
        fallback_mime: &str,
    ) -> Result<Vec<ImagePayload>> {
        let mut out = Vec::new();
        let predictions = response_payload
            .get("predictions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for row in predictions {
            let Some(obj) = row.as_object() else {
                continue;
            };
            let source = if obj.contains_key("bytesBase64Encoded")
                || obj.contains_key("bytes_base64_encoded")
            {
                obj.clone()
            } else {
                obj.get("image")
                    .or_else(|| obj.get("generatedImage"))
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default()
            };
            let Some(encoded) = source
                .get("bytesBase64Encoded")
                .or_else(|| source.get("bytes_base64_encoded"))
                .or_else(|| source.get("imageBytes"))
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
            else {
                continue;
            };
            let mime_type = mime_field(&source).unwrap_or(fallback_mime);
            out.push(
                ImagePayload::from_base64(encoded, mime_type)
                    .context("Imagen image base64 decode failed")?,
            );
        }
        Ok(out)
    }

    /// Parts of the first candidate, in response order.
    pub(crate) fn extract_parts(response_payload: &Value) -> Result<Vec<ContentPart>> {
        let Some(candidate) = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
        else {
            if let Some(reason) = response_payload
                .get("promptFeedback")
                .and_then(|feedback| feedback.get("blockReason"))
                .and_then(Value::as_str)
            {
                bail!("Gemini blocked the prompt ({reason})");
            }
            return Ok(Vec::new());
        };

        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut out = Vec::new();
        for part in parts {
            if let Some(text) = part
                .get("text")
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
            {
                out.push(ContentPart::Text(text.to_string()));
                continue;
            }
            // An inline part with no data still counts as the latest image.
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mime_type = mime_field(inline).unwrap_or("image/png");
            out.push(ContentPart::InlineImage(
                ImagePayload::from_base64(data, mime_type)
                    .context("Gemini image base64 decode failed")?,
            ));
        }
        Ok(out)
    }
}

impl DesignModel for GoogleModel {
    fn name(&self) -> &str {
        "google"
    }

    fn generate_images(&self, request: &GenerateRequest) -> Result<Vec<ImagePayload>> {
        let endpoint = self.predict_endpoint(&request.model);
        let payload = Self::predict_payload(request);
        debug!(%endpoint, "posting Imagen predict");
        let response_payload = self.post("Imagen", &endpoint, &payload)?;
        Self::extract_predictions(&response_payload, &request.output_mime_type)
    }

    fn refine_content(&self, request: &RefineRequest) -> Result<Vec<ContentPart>> {
        let endpoint = self.generate_content_endpoint(&request.model);
        let payload = Self::generate_content_payload(request);
        debug!(%endpoint, "posting Gemini generateContent");
        let response_payload = self.post("Gemini", &endpoint, &payload)?;
        Self::extract_parts(&response_payload)
    }
}

fn mime_field(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("mimeType")
        .or_else(|| obj.get("mime_type"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}
