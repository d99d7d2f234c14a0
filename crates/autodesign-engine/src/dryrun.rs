use std::io::Cursor;

use anyhow::{Context, Result};
use autodesign_contracts::images::ImagePayload;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use crate::{ContentPart, DesignModel, GenerateRequest, RefineRequest};

/// Offline stand-in for the remote model: flat colour images derived from the prompt.
#[derive(Debug, Clone)]
pub struct DryrunModel {
    long_edge: u32,
}

impl Default for DryrunModel {
    fn default() -> Self {
        Self { long_edge: 512 }
    }
}

impl DryrunModel {
    pub fn with_long_edge(long_edge: u32) -> Self {
        Self {
            long_edge: long_edge.max(1),
        }
    }
}

impl DesignModel for DryrunModel {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_images(&self, request: &GenerateRequest) -> Result<Vec<ImagePayload>> {
        let (width, height) = request.aspect_ratio.dimensions(self.long_edge);
        let format = if request.output_mime_type.contains("png") {
            ImageFormat::Png
        } else {
            ImageFormat::Jpeg
        };
        let mut images = Vec::new();
        for idx in 0..request.number_of_images.max(1) {
            let rgb = color_from_seed(request.prompt.as_bytes(), idx as u64);
            let bytes = encode_solid(width, height, rgb, format)?;
            images.push(ImagePayload::new(bytes, format.to_mime_type()));
        }
        Ok(images)
    }

    fn refine_content(&self, request: &RefineRequest) -> Result<Vec<ContentPart>> {
        let (width, height) = image::load_from_memory(request.image.bytes())
            .map(|decoded| decoded.dimensions())
            .unwrap_or((self.long_edge, self.long_edge));
        let mut seed = request.image.bytes().to_vec();
        seed.extend_from_slice(request.instruction.as_bytes());
        let bytes = encode_solid(width, height, color_from_seed(&seed, 0), ImageFormat::Png)?;
        Ok(vec![
            ContentPart::Text(format!("Dry run refinement: {}", request.instruction)),
            ContentPart::InlineImage(ImagePayload::new(bytes, "image/png")),
        ])
    }
}

fn encode_solid(width: u32, height: u32, rgb: [u8; 3], format: ImageFormat) -> Result<Vec<u8>> {
    let image = RgbImage::from_pixel(width.max(1), height.max(1), Rgb(rgb));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut cursor, format)
        .with_context(|| format!("failed to encode dry run {format:?} image"))?;
    Ok(cursor.into_inner())
}

fn color_from_seed(seed: &[u8], idx: u64) -> [u8; 3] {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(idx.to_be_bytes());
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2]]
}

#[cfg(test)]
mod tests {
    use autodesign_contracts::images::ImagePayload;
    use autodesign_contracts::session::AspectRatio;
    use image::GenericImageView;

    use super::DryrunModel;
    use crate::{select_refinement, DesignModel, GenerateRequest, RefineRequest};

    fn request(prompt: &str, aspect_ratio: AspectRatio) -> GenerateRequest {
        GenerateRequest {
            model: "dryrun-image-1".to_string(),
            prompt: prompt.to_string(),
            aspect_ratio,
            number_of_images: 1,
            output_mime_type: "image/jpeg".to_string(),
        }
    }

    #[test]
    fn generates_decodable_jpeg_at_aspect_ratio() -> anyhow::Result<()> {
        let model = DryrunModel::with_long_edge(160);
        let images = model.generate_images(&request("silver coupe", AspectRatio::Landscape))?;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime_type(), "image/jpeg");

        let decoded = image::load_from_memory(images[0].bytes())?;
        assert_eq!(decoded.dimensions(), (160, 90));
        Ok(())
    }

    #[test]
    fn same_prompt_gives_same_image() -> anyhow::Result<()> {
        let model = DryrunModel::with_long_edge(32);
        let a = model.generate_images(&request("red hatchback", AspectRatio::Square))?;
        let b = model.generate_images(&request("red hatchback", AspectRatio::Square))?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn refine_keeps_source_dimensions_and_captions() -> anyhow::Result<()> {
        let model = DryrunModel::with_long_edge(64);
        let source = model
            .generate_images(&request("wagon", AspectRatio::Portrait))?
            .remove(0);
        let parts = model.refine_content(&RefineRequest {
            model: "dryrun-image-1".to_string(),
            image: source,
            instruction: "add roof rails".to_string(),
        })?;
        let refinement = select_refinement(parts).expect("dry run always returns an image");
        assert_eq!(refinement.caption, "Dry run refinement: add roof rails");
        assert_eq!(refinement.image.mime_type(), "image/png");
        let decoded = image::load_from_memory(refinement.image.bytes())?;
        assert_eq!(decoded.dimensions(), (36, 64));
        Ok(())
    }

    #[test]
    fn refine_tolerates_undecodable_source() -> anyhow::Result<()> {
        let model = DryrunModel::with_long_edge(16);
        let parts = model.refine_content(&RefineRequest {
            model: "dryrun-image-1".to_string(),
            image: ImagePayload::new(b"not an image".to_vec(), "image/png"),
            instruction: "anything".to_string(),
        })?;
        assert!(select_refinement(parts).is_some());
        Ok(())
    }
}
