//! OCR over captured frames
//!
//! Produces word-level bounding boxes for the text locator. The engine is
//! an explicitly constructed, injectable service so the controller can be
//! tested against a scripted fake.

use std::collections::HashMap;

use image::{DynamicImage, GrayImage};
use imageproc::contrast::{threshold, ThresholdType};
use rusty_tesseract::{image_to_data, Args, Image as TessImage};

use crate::geometry::BoundingBox;
use crate::vision::Frame;

/// Binarization cutoff chosen to separate shop text from the game's
/// background art.
pub const OCR_THRESHOLD: u8 = 150;

/// One OCR-detected word with its frame-local bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub bbox: BoundingBox,
    /// Engine confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Word {
    pub fn new(text: impl Into<String>, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            text: text.into(),
            bbox: BoundingBox {
                x,
                y,
                width,
                height,
            },
            confidence: 1.0,
        }
    }
}

/// Word-level OCR backend.
pub trait OcrEngine: Send {
    /// Extract words and bounding boxes from a preprocessed grayscale image.
    fn read_words(&self, image: &GrayImage) -> Result<Vec<Word>, OcrError>;
}

/// Grayscale + fixed binary threshold, applied to every frame before OCR to
/// maximize contrast.
pub fn preprocess(frame: &Frame) -> GrayImage {
    let gray = image::imageops::grayscale(&frame.image);
    threshold(&gray, OCR_THRESHOLD, ThresholdType::Binary)
}

/// OCR engine backed by Tesseract via `rusty-tesseract`.
pub struct TesseractOcr {
    args: Args,
}

impl TesseractOcr {
    /// Create an engine reading English text in sparse-layout mode.
    pub fn new() -> Self {
        Self {
            args: Args {
                lang: "eng".to_string(),
                config_variables: HashMap::new(),
                dpi: Some(150),
                // PSM 11: sparse text, no assumed layout. Shop rows are
                // scattered labels, not paragraphs.
                psm: Some(11),
                oem: Some(3),
            },
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcr {
    fn read_words(&self, image: &GrayImage) -> Result<Vec<Word>, OcrError> {
        let dynamic = DynamicImage::ImageLuma8(image.clone());
        let tess_image = TessImage::from_dynamic_image(&dynamic)
            .map_err(|e| OcrError::Engine(e.to_string()))?;
        let output =
            image_to_data(&tess_image, &self.args).map_err(|e| OcrError::Engine(e.to_string()))?;

        let words = output
            .data
            .into_iter()
            // Level 5 rows are words; lower levels are page/block/line
            // aggregates with empty text.
            .filter(|d| d.level == 5 && !d.text.trim().is_empty() && d.conf >= 0.0)
            .map(|d| Word {
                text: d.text.trim().to_string(),
                bbox: BoundingBox {
                    x: d.left,
                    y: d.top,
                    width: d.width.max(0) as u32,
                    height: d.height.max(0) as u32,
                },
                confidence: d.conf / 100.0,
            })
            .collect();
        Ok(words)
    }
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("failed to process image: {0}")]
    ProcessingError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba, RgbaImage};

    #[test]
    fn test_preprocess_binarizes() {
        let img: RgbaImage = ImageBuffer::from_fn(4, 1, |x, _| match x {
            0 => Rgba([0, 0, 0, 255]),
            1 => Rgba([140, 140, 140, 255]),
            2 => Rgba([160, 160, 160, 255]),
            _ => Rgba([255, 255, 255, 255]),
        });
        let frame = Frame::new(img, None);
        let out = preprocess(&frame);
        // Everything at or below the cutoff goes black, everything above
        // goes white.
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 0);
        assert_eq!(out.get_pixel(2, 0).0[0], 255);
        assert_eq!(out.get_pixel(3, 0).0[0], 255);
    }
}
