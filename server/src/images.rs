//! Recipe images arrive as base64 payloads (usually `data:image/png;base64,...`)
//! and are stored in the recipe row together with their detected content type.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageFormat;

/// Allowed image formats for recipe images.
pub const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Maximum decoded image size (10MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

pub const IMAGE_TOO_LARGE: &str = "Image is too large. Maximum size is 10MB";

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Decode a base64 image payload, with or without a `data:` URL header,
/// and check that the bytes are one of the allowed formats.
pub fn decode_image(payload: &str) -> Result<DecodedImage, String> {
    let payload = payload.trim();

    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| "Malformed data URL".to_string())?;
            if !header.ends_with(";base64") {
                return Err("Image data must be base64 encoded".to_string());
            }
            data
        }
        None => payload,
    };

    // Rough pre-check so a huge payload is rejected before decoding
    if encoded.len() / 4 * 3 > MAX_FILE_SIZE + 3 {
        return Err(IMAGE_TOO_LARGE.to_string());
    }

    let data = STANDARD
        .decode(encoded)
        .map_err(|e| format!("Invalid base64 image data: {}", e))?;

    if data.is_empty() {
        return Err("The submitted file is empty.".to_string());
    }

    if data.len() > MAX_FILE_SIZE {
        return Err(IMAGE_TOO_LARGE.to_string());
    }

    let content_type = detect_content_type(&data)?;

    Ok(DecodedImage { content_type, data })
}

/// Detect format from magic bytes and validate it's allowed.
pub fn detect_content_type(data: &[u8]) -> Result<String, String> {
    let format = image::guess_format(data)
        .map_err(|_| "Upload a valid image. The file you uploaded was either not an image or a corrupted image.".to_string())?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(format!(
            "Unsupported image format: {:?}. Allowed: JPEG, PNG, GIF, WebP",
            format
        ));
    }

    Ok(format.to_mime_type().to_string())
}
