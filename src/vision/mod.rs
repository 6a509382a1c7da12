//! Vision and image processing module
//!
//! Handles screen capture, template matching, OCR-based text location and
//! HSV color-blob detection over captured frames.

pub mod color;
pub mod ocr;
pub mod template;
pub mod text;

use image::RgbaImage;
use xcap::Monitor;

use crate::geometry::{LocalPoint, Region, ScreenPoint};

/// A captured pixel buffer tagged with the screen region it came from.
///
/// Frames are ephemeral: one is captured per scan and dropped afterwards;
/// matches produced from a frame are only valid for that frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Pixel data in RGBA.
    pub image: RgbaImage,
    /// Capture origin, or `None` for a full-screen capture.
    pub region: Option<Region>,
}

impl Frame {
    pub fn new(image: RgbaImage, region: Option<Region>) -> Self {
        Self { image, region }
    }

    /// Frame dimensions in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Translate a frame-local point into screen-absolute coordinates by
    /// adding the capture-region origin.
    pub fn to_screen(&self, p: LocalPoint) -> ScreenPoint {
        match self.region {
            Some(region) => region.to_screen(p),
            None => ScreenPoint::new(p.x, p.y),
        }
    }

    /// Vertical scale factor of this frame relative to a reference height.
    ///
    /// Pixel distances tuned on the reference layout are multiplied by this
    /// before being compared against frame-local coordinates.
    pub fn height_scale(&self, reference_height: u32) -> f32 {
        self.image.height() as f32 / reference_height as f32
    }
}

/// Source of raw frames for a configured region or the whole display.
pub trait FrameSource: Send {
    /// Capture a frame, cropped to `region` when one is given.
    fn capture(&mut self, region: Option<Region>) -> Result<Frame, CaptureError>;
}

/// Frame source backed by the OS compositor via `xcap`.
pub struct MonitorSource;

impl MonitorSource {
    pub fn new() -> Self {
        Self
    }

    fn monitor_for(region: Option<Region>) -> Result<Monitor, CaptureError> {
        let monitors = Monitor::all().map_err(backend)?;
        let chosen = match region {
            Some(r) => match Self::containing(&monitors, r)? {
                Some(m) => Some(m),
                None => Self::primary(&monitors)?,
            },
            None => match Self::primary(&monitors)? {
                Some(m) => Some(m),
                None => monitors.first().cloned(),
            },
        };
        chosen.ok_or(CaptureError::NoMonitor)
    }

    /// The monitor whose bounds contain the region origin, if any.
    fn containing(monitors: &[Monitor], r: Region) -> Result<Option<Monitor>, CaptureError> {
        for m in monitors {
            let x = m.x().map_err(backend)?;
            let y = m.y().map_err(backend)?;
            let w = m.width().map_err(backend)? as i32;
            let h = m.height().map_err(backend)? as i32;
            if r.x >= x && r.y >= y && r.x < x + w && r.y < y + h {
                return Ok(Some(m.clone()));
            }
        }
        Ok(None)
    }

    fn primary(monitors: &[Monitor]) -> Result<Option<Monitor>, CaptureError> {
        for m in monitors {
            if m.is_primary().map_err(backend)? {
                return Ok(Some(m.clone()));
            }
        }
        Ok(None)
    }
}

fn backend(e: xcap::XCapError) -> CaptureError {
    CaptureError::Backend(e.to_string())
}

impl Default for MonitorSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for MonitorSource {
    fn capture(&mut self, region: Option<Region>) -> Result<Frame, CaptureError> {
        let monitor = Self::monitor_for(region)?;
        let full = monitor.capture_image().map_err(backend)?;

        let Some(r) = region else {
            return Ok(Frame::new(full, None));
        };

        // Region is in screen coordinates; the capture is monitor-local.
        let local_x = (r.x - monitor.x().map_err(backend)?).max(0) as u32;
        let local_y = (r.y - monitor.y().map_err(backend)?).max(0) as u32;
        if local_x + r.width > full.width() || local_y + r.height > full.height() {
            return Err(CaptureError::RegionOutOfBounds {
                region: r,
                screen: (full.width(), full.height()),
            });
        }

        let cropped =
            image::imageops::crop_imm(&full, local_x, local_y, r.width, r.height).to_image();
        Ok(Frame::new(cropped, Some(r)))
    }
}

/// Capture errors
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no monitor available")]
    NoMonitor,
    #[error("capture region {region:?} exceeds screen bounds {screen:?}")]
    RegionOutOfBounds { region: Region, screen: (u32, u32) },
    #[error("capture backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    #[test]
    fn test_frame_to_screen_with_region() {
        let img: RgbaImage = ImageBuffer::new(10, 10);
        let frame = Frame::new(img, Some(Region::new(100, 50, 10, 10)));
        let p = frame.to_screen(LocalPoint::new(3, 4));
        assert_eq!(p, ScreenPoint::new(103, 54));
    }

    #[test]
    fn test_frame_to_screen_full_screen() {
        let img: RgbaImage = ImageBuffer::new(10, 10);
        let frame = Frame::new(img, None);
        let p = frame.to_screen(LocalPoint::new(3, 4));
        assert_eq!(p, ScreenPoint::new(3, 4));
    }

    #[test]
    fn test_height_scale() {
        let img: RgbaImage = ImageBuffer::new(10, 1068);
        let frame = Frame::new(img, None);
        assert!((frame.height_scale(534) - 2.0).abs() < f32::EPSILON);
    }
}
