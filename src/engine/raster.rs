//! Thumbnail rasterization

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbaImage};

use crate::domain::errors::DomainError;
use crate::domain::model::RgbaFrame;

/// Stretch `frame` onto a `size`x`size` tile and encode it as JPEG
pub fn encode_thumbnail(frame: &RgbaFrame, size: u32, quality: u8) -> Result<Vec<u8>, DomainError> {
    if size == 0 {
        return Err(DomainError::BadArgs("Thumbnail size must be positive".to_string()));
    }
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
        DomainError::ProcessingError(format!(
            "Frame buffer of {} bytes does not match {}x{} RGBA",
            frame.data.len(),
            frame.width,
            frame.height
        ))
    })?;

    let tile = image::imageops::resize(&image, size, size, FilterType::Triangle);
    let rgb = DynamicImage::ImageRgba8(tile).to_rgb8();

    let mut jpeg = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| DomainError::ProcessingError(format!("JPEG encoding failed: {}", e)))?;

    Ok(jpeg.into_inner())
}

/// Pixel size of an encoded still image, read from its header
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), DomainError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DomainError::UnsupportedSource(format!("Unreadable image: {}", e)))?
        .into_dimensions()
        .map_err(|e| DomainError::UnsupportedSource(format!("Unreadable image: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32) -> RgbaFrame {
        RgbaFrame {
            width,
            height,
            data: [200u8, 40, 40, 255].repeat((width * height) as usize),
        }
    }

    #[test]
    fn test_encodes_jpeg_tile() {
        let jpeg = encode_thumbnail(&solid_frame(32, 18), 80, 50).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (80, 80));
    }

    #[test]
    fn test_image_dimensions_from_header() {
        let jpeg = encode_thumbnail(&solid_frame(8, 8), 64, 50).unwrap();
        assert_eq!(image_dimensions(&jpeg).unwrap(), (64, 64));
        assert!(matches!(
            image_dimensions(&[0u8; 16]),
            Err(DomainError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_rejects_short_buffer() {
        let mut frame = solid_frame(4, 4);
        frame.data.truncate(10);
        assert!(matches!(
            encode_thumbnail(&frame, 80, 50),
            Err(DomainError::ProcessingError(_))
        ));
    }
}
