// src/services/image_processor.rs
use crate::errors::GenerationError;
use crate::models::SourceImage;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use image::{GenericImageView, ImageFormat as ImgFormat};

const MAX_INPUT_DIMENSION: u32 = 4096;
pub const FALLBACK_MIME: &str = "image/jpeg";

pub struct ImageProcessor {
    max_dimension: u32,
}

/// Splits `data:<mime>;base64,<payload>` into its declared mime and payload.
/// Input without a prefix is treated as bare base64.
pub fn split_data_uri(input: &str) -> (Option<String>, &str) {
    let input = input.trim();
    let Some(rest) = input.strip_prefix("data:") else {
        return (None, input);
    };
    match rest.split_once(',') {
        Some((header, payload)) => {
            let mime = header
                .split(';')
                .next()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(|m| m.to_ascii_lowercase());
            (mime, payload)
        }
        None => (None, rest),
    }
}

pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        ImgFormat::Png => Some("image/png"),
        ImgFormat::Jpeg => Some("image/jpeg"),
        ImgFormat::WebP => Some("image/webp"),
        ImgFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

fn normalize_mime(declared: Option<&str>, data: &[u8]) -> String {
    let declared = declared.map(|m| match m {
        "image/jpg" => "image/jpeg",
        other => other,
    });
    match declared {
        Some(mime) if mime.starts_with("image/") => mime.to_string(),
        _ => sniff_mime(data).unwrap_or(FALLBACK_MIME).to_string(),
    }
}

impl ImageProcessor {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    pub fn from_data_uri(&self, input: &str) -> Result<SourceImage, GenerationError> {
        let (declared, payload) = split_data_uri(input);
        if payload.is_empty() {
            return Err(GenerationError::Validation(
                "No product image was provided".to_string(),
            ));
        }
        let data = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| GenerationError::ImageProcessing(format!("Invalid base64 image: {}", e)))?;
        self.prepare(data, declared.as_deref())
    }

    pub fn prepare(
        &self,
        data: Vec<u8>,
        declared_mime: Option<&str>,
    ) -> Result<SourceImage, GenerationError> {
        if data.is_empty() {
            return Err(GenerationError::Validation(
                "No product image was provided".to_string(),
            ));
        }
        self.validate_image(&data)?;
        let mime_type = normalize_mime(declared_mime, &data);

        match self.resize_if_needed(&data)? {
            Some(resized) => Ok(SourceImage {
                data: Bytes::from(resized),
                mime_type: "image/png".to_string(),
            }),
            None => Ok(SourceImage {
                data: Bytes::from(data),
                mime_type,
            }),
        }
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), GenerationError> {
        let img = image::load_from_memory(data).map_err(|e| {
            GenerationError::ImageProcessing(format!("Invalid image format: {}", e))
        })?;

        let (width, height) = img.dimensions();

        if width > MAX_INPUT_DIMENSION || height > MAX_INPUT_DIMENSION {
            return Err(GenerationError::ImageProcessing(format!(
                "Image dimensions exceed {0}x{0}",
                MAX_INPUT_DIMENSION
            )));
        }

        Ok((width, height))
    }

    fn resize_if_needed(&self, data: &[u8]) -> Result<Option<Vec<u8>>, GenerationError> {
        let img = image::load_from_memory(data)
            .map_err(|e| GenerationError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let (width, height) = img.dimensions();
        let max_size = self.max_dimension.max(1);

        if width <= max_size && height <= max_size {
            return Ok(None);
        }

        let ratio = (max_size as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                GenerationError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(Some(output))
    }
}

/// Letterboxes `source` onto a white `width`x`height` canvas, preserving its
/// aspect ratio. Video endpoints that take a reference frame require it to
/// match the requested output size exactly.
pub fn fit_to_frame(source: &SourceImage, width: u32, height: u32) -> Result<SourceImage, GenerationError> {
    if width == 0 || height == 0 {
        return Err(GenerationError::ImageProcessing(format!(
            "Invalid frame size {}x{}",
            width, height
        )));
    }
    let img = image::load_from_memory(&source.data)
        .map_err(|e| GenerationError::ImageProcessing(format!("Failed to load image: {}", e)))?;

    let (src_width, src_height) = img.dimensions();
    if (src_width, src_height) == (width, height) {
        return Ok(source.clone());
    }

    let resized = img.resize(width, height, image::imageops::FilterType::Lanczos3);
    let (fit_width, fit_height) = resized.dimensions();
    let mut canvas = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));
    image::imageops::overlay(
        &mut canvas,
        &resized.to_rgba8(),
        i64::from((width - fit_width.min(width)) / 2),
        i64::from((height - fit_height.min(height)) / 2),
    );

    let mut output = Vec::new();
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
        .map_err(|e| GenerationError::ImageProcessing(format!("Failed to encode frame: {}", e)))?;

    Ok(SourceImage {
        data: Bytes::from(output),
        mime_type: "image/png".to_string(),
    })
}

#[cfg(test)]
pub(crate) fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut output = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
        .unwrap();
    output
}
