use super::CapturedImage;
use crate::config::CaptureConfig;
use crate::errors::BoardSightError;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

/// Image encoding used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    Png,
    Jpeg { quality: u8 },
}

impl FrameFormat {
    pub fn parse(name: &str, jpeg_quality: u8) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Some(FrameFormat::Png),
            "jpeg" | "jpg" => Some(FrameFormat::Jpeg {
                quality: jpeg_quality.clamp(1, 100),
            }),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FrameFormat::Png => "image/png",
            FrameFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        FrameFormat::Png
    }
}

/// One encoded camera sample. Sent once, then dropped.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Assigned at capture time, strictly increasing within a session
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub data: Vec<u8>,
}

impl Frame {
    /// `data:<mime>;base64,<payload>` form expected by the streaming endpoint.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Converts raw device pixels into encoded frames.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    format: FrameFormat,
    fallback: (u32, u32),
}

impl FrameEncoder {
    pub fn new(format: FrameFormat, fallback: (u32, u32)) -> Self {
        Self { format, fallback }
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self, BoardSightError> {
        let format = FrameFormat::parse(&config.frame_format, config.jpeg_quality).ok_or_else(|| {
            BoardSightError::Config(format!("unsupported frame format '{}'", config.frame_format))
        })?;
        let [w, h] = config.fallback_resolution;
        Ok(Self::new(format, (w, h)))
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Encode one sample.
    ///
    /// A source reporting a zero dimension is not ready yet; it yields a blank
    /// frame at the fallback resolution instead of an error. A pixel buffer
    /// that does not match its dimensions is rejected.
    pub fn encode(&self, sequence: u64, image: CapturedImage) -> Result<Frame, String> {
        let image = if image.has_zero_dimension() {
            log::debug!(
                "Source reported {}x{}, using {}x{} fallback",
                image.width,
                image.height,
                self.fallback.0,
                self.fallback.1
            );
            CapturedImage::blank(self.fallback.0, self.fallback.1)
        } else {
            image
        };

        if image.pixels.len() != image.expected_len() {
            return Err(format!(
                "pixel buffer holds {} bytes, {}x{} RGB needs {}",
                image.pixels.len(),
                image.width,
                image.height,
                image.expected_len()
            ));
        }

        let mut data = Vec::with_capacity(image.pixels.len() / 4);
        let written = match self.format {
            FrameFormat::Png => PngEncoder::new(&mut data).write_image(
                &image.pixels,
                image.width,
                image.height,
                ExtendedColorType::Rgb8,
            ),
            FrameFormat::Jpeg { quality } => JpegEncoder::new_with_quality(&mut data, quality)
                .write_image(
                    &image.pixels,
                    image.width,
                    image.height,
                    ExtendedColorType::Rgb8,
                ),
        };
        written.map_err(|e| format!("failed to encode frame: {}", e))?;

        Ok(Frame {
            sequence,
            captured_at: Utc::now(),
            width: image.width,
            height: image.height,
            format: self.format,
            data,
        })
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(FrameFormat::Png, (640, 480))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_png_encoding() {
        let encoder = FrameEncoder::default();
        let frame = encoder.encode(7, CapturedImage::blank(16, 8)).unwrap();
        assert_eq!(frame.sequence, 7);
        assert_eq!((frame.width, frame.height), (16, 8));
        assert_eq!(&frame.data[..8], &PNG_MAGIC);
        assert!(frame.to_data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_jpeg_encoding() {
        let encoder = FrameEncoder::new(FrameFormat::Jpeg { quality: 70 }, (640, 480));
        let frame = encoder.encode(1, CapturedImage::blank(32, 32)).unwrap();
        assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);
        assert!(frame.to_data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_zero_dimension_uses_fallback() {
        let encoder = FrameEncoder::new(FrameFormat::Png, (64, 48));
        let frame = encoder.encode(1, CapturedImage::new(0, 0, Vec::new())).unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));

        let decoded = image::load_from_memory(&frame.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_mismatched_buffer_is_rejected() {
        let encoder = FrameEncoder::default();
        let err = encoder
            .encode(1, CapturedImage::new(10, 10, vec![0; 12]))
            .unwrap_err();
        assert!(err.contains("needs 300"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(FrameFormat::parse("PNG", 85), Some(FrameFormat::Png));
        assert_eq!(
            FrameFormat::parse("jpg", 0),
            Some(FrameFormat::Jpeg { quality: 1 })
        );
        assert_eq!(FrameFormat::parse("gif", 85), None);

        let config = CaptureConfig {
            frame_format: "webp".to_string(),
            ..CaptureConfig::default()
        };
        assert!(FrameEncoder::from_config(&config).is_err());
    }
}
