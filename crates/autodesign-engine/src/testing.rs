use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use autodesign_contracts::images::ImagePayload;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::{ContentPart, DesignModel, GenerateRequest, RefineRequest};

pub(crate) fn png(bytes: &[u8]) -> ImagePayload {
    ImagePayload::new(bytes.to_vec(), "image/png")
}

pub(crate) fn tiny_png() -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([10, 20, 30])))
        .write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

#[derive(Debug, Clone)]
pub(crate) enum Call {
    Generate(GenerateRequest),
    Refine(RefineRequest),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog {
    inner: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    fn push(&self, call: Call) {
        if let Ok(mut calls) = self.inner.lock() {
            calls.push(call);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub(crate) fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.snapshot()
            .into_iter()
            .filter_map(|call| match call {
                Call::Generate(request) => Some(request),
                Call::Refine(_) => None,
            })
            .collect()
    }

    pub(crate) fn refine_requests(&self) -> Vec<RefineRequest> {
        self.snapshot()
            .into_iter()
            .filter_map(|call| match call {
                Call::Refine(request) => Some(request),
                Call::Generate(_) => None,
            })
            .collect()
    }

    fn snapshot(&self) -> Vec<Call> {
        self.inner
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

/// Model that replays queued responses and records every call. With an empty
/// queue it answers with a small successful image.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    generate: Mutex<VecDeque<Result<Vec<ImagePayload>>>>,
    refine: Mutex<VecDeque<Result<Vec<ContentPart>>>>,
    calls: CallLog,
}

impl ScriptedModel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    pub(crate) fn push_generate(&self, response: Result<Vec<ImagePayload>>) {
        if let Ok(mut queue) = self.generate.lock() {
            queue.push_back(response);
        }
    }

    pub(crate) fn push_refine(&self, response: Result<Vec<ContentPart>>) {
        if let Ok(mut queue) = self.refine.lock() {
            queue.push_back(response);
        }
    }
}

impl DesignModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate_images(&self, request: &GenerateRequest) -> Result<Vec<ImagePayload>> {
        self.calls.push(Call::Generate(request.clone()));
        let next = self
            .generate
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        next.unwrap_or_else(|| Ok(vec![ImagePayload::new(b"generated".to_vec(), "image/jpeg")]))
    }

    fn refine_content(&self, request: &RefineRequest) -> Result<Vec<ContentPart>> {
        self.calls.push(Call::Refine(request.clone()));
        let next = self
            .refine
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        next.unwrap_or_else(|| {
            Ok(vec![ContentPart::InlineImage(png(b"refined"))])
        })
    }
}
