//! Image validation and encoding for vision requests.

use std::io::Cursor;

use base64::Engine;

/// Caps applied to every inbound image before it reaches the backend.
#[derive(Debug, Clone, Copy)]
pub struct ImageLimits {
    pub max_bytes: usize,
    pub max_dimension: u32,
}

#[derive(Debug)]
pub enum ImageError {
    TooLarge { bytes: usize, max: usize },
    OverResolution { width: u32, height: u32, max: u32 },
    Decode(String),
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::TooLarge { bytes, max } => {
                write!(f, "image is {bytes} bytes, max {max}")
            }
            ImageError::OverResolution { width, height, max } => {
                write!(f, "image is {width}x{height}, max dimension {max}")
            }
            ImageError::Decode(e) => write!(f, "failed to decode image: {e}"),
        }
    }
}

impl std::error::Error for ImageError {}

/// Check byte size and pixel dimensions against the configured caps.
pub fn validate(data: &[u8], limits: ImageLimits) -> Result<(), ImageError> {
    if data.len() > limits.max_bytes {
        return Err(ImageError::TooLarge { bytes: data.len(), max: limits.max_bytes });
    }

    let (width, height) = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ImageError::Decode(e.to_string()))?;

    if width > limits.max_dimension || height > limits.max_dimension {
        return Err(ImageError::OverResolution { width, height, max: limits.max_dimension });
    }
    Ok(())
}

/// Embed image bytes as a base64 data URL for the chat-completion wire shape.
pub fn to_data_url(data: &[u8], media_type: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    format!("data:{media_type};base64,{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: ImageLimits = ImageLimits { max_bytes: 1024, max_dimension: 64 };

    /// 1x1 transparent PNG.
    fn tiny_png() -> Vec<u8> {
        base64::engine::general_purpose::STANDARD
            .decode("iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==")
            .unwrap()
    }

    #[test]
    fn test_small_image_passes() {
        assert!(validate(&tiny_png(), LIMITS).is_ok());
    }

    #[test]
    fn test_oversized_bytes_rejected() {
        let limits = ImageLimits { max_bytes: 10, max_dimension: 64 };
        let err = validate(&tiny_png(), limits).unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { .. }));
    }

    #[test]
    fn test_over_resolution_rejected() {
        let limits = ImageLimits { max_bytes: 1024, max_dimension: 0 };
        let err = validate(&tiny_png(), limits).unwrap_err();
        assert!(matches!(err, ImageError::OverResolution { .. }));
    }

    #[test]
    fn test_garbage_rejected() {
        let err = validate(b"not an image", LIMITS).unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[test]
    fn test_data_url_shape() {
        let url = to_data_url(&[1, 2, 3], "image/jpeg");
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(url, "data:image/jpeg;base64,AQID");
    }
}
