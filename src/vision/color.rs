//! Color-blob detection
//!
//! Finds the green "buy" buttons and the white close button by HSV
//! thresholding, independent of text rendering. Shape filters reject the
//! square seed icons that share the button hue.

use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};

use crate::geometry::LocalPoint;
use crate::vision::Frame;

/// Layout the shape/area thresholds below were tuned against.
pub const REFERENCE_WIDTH: u32 = 645;
pub const REFERENCE_HEIGHT: u32 = 534;

/// An inclusive HSV window; hue in degrees `[0, 360)`, saturation and
/// value in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HsvRange {
    pub h_min: f32,
    pub h_max: f32,
    pub s_min: f32,
    pub s_max: f32,
    pub v_min: f32,
    pub v_max: f32,
}

impl HsvRange {
    fn contains(&self, h: f32, s: f32, v: f32) -> bool {
        h >= self.h_min
            && h <= self.h_max
            && s >= self.s_min
            && s <= self.s_max
            && v >= self.v_min
            && v <= self.v_max
    }
}

/// A connected component extracted from a binary mask.
#[derive(Debug, Clone, Copy)]
struct Blob {
    center: LocalPoint,
    area: u32,
    width: u32,
    height: u32,
}

impl Blob {
    fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Detects button-shaped color regions in captured frames.
pub struct ColorLocator {
    /// Hue windows for the buy button greens. The button gradient spans a
    /// vivid and a pale band, hence two ranges.
    button_ranges: Vec<HsvRange>,
    /// Hue window for the white/light close button.
    close_range: HsvRange,
    /// Blob area window in pixels at the reference resolution.
    area_window: (f32, f32),
    /// Wide-rectangle aspect window for buy buttons.
    button_aspect: (f32, f32),
    /// Minimum buy-button width in pixels at the reference resolution.
    button_min_width: f32,
    /// Near-square aspect window for the close button.
    close_aspect: (f32, f32),
}

impl ColorLocator {
    pub fn new() -> Self {
        Self {
            button_ranges: vec![
                // vivid green body
                HsvRange {
                    h_min: 85.0,
                    h_max: 160.0,
                    s_min: 0.40,
                    s_max: 1.0,
                    v_min: 0.35,
                    v_max: 1.0,
                },
                // pale green highlight
                HsvRange {
                    h_min: 85.0,
                    h_max: 160.0,
                    s_min: 0.18,
                    s_max: 0.45,
                    v_min: 0.55,
                    v_max: 1.0,
                },
            ],
            close_range: HsvRange {
                h_min: 0.0,
                h_max: 360.0,
                s_min: 0.0,
                s_max: 0.25,
                v_min: 0.80,
                v_max: 1.0,
            },
            area_window: (150.0, 8000.0),
            button_aspect: (1.8, 6.0),
            button_min_width: 40.0,
            close_aspect: (0.5, 2.0),
        }
    }

    /// Find the centers of green buy-button blobs, sorted by descending
    /// contour area (largest first).
    pub fn find_buy_buttons(&self, frame: &Frame) -> Vec<LocalPoint> {
        let (w, h) = frame.dimensions();
        let area_scale =
            (w as f32 * h as f32) / (REFERENCE_WIDTH as f32 * REFERENCE_HEIGHT as f32);
        let width_scale = w as f32 / REFERENCE_WIDTH as f32;
        let (area_min, area_max) = (
            self.area_window.0 * area_scale,
            self.area_window.1 * area_scale,
        );
        let min_width = self.button_min_width * width_scale;

        let mask = hsv_mask(frame, &self.button_ranges);
        let mut blobs: Vec<Blob> = extract_blobs(&mask)
            .into_iter()
            .filter(|b| {
                let area = b.area as f32;
                let ratio = b.aspect_ratio();
                area >= area_min
                    && area <= area_max
                    && ratio > self.button_aspect.0
                    && ratio < self.button_aspect.1
                    && b.width as f32 >= min_width
            })
            .collect();
        blobs.sort_by(|a, b| b.area.cmp(&a.area));
        blobs.into_iter().map(|b| b.center).collect()
    }

    /// Find the white close button, preferring candidates in the upper
    /// right of the frame.
    pub fn find_close_button(&self, frame: &Frame) -> Option<LocalPoint> {
        let (w, h) = frame.dimensions();
        let area_scale =
            (w as f32 * h as f32) / (REFERENCE_WIDTH as f32 * REFERENCE_HEIGHT as f32);
        let (area_min, area_max) = (
            self.area_window.0 * area_scale,
            self.area_window.1 * area_scale,
        );

        let mask = hsv_mask(frame, std::slice::from_ref(&self.close_range));
        extract_blobs(&mask)
            .into_iter()
            .filter(|b| {
                let area = b.area as f32;
                let ratio = b.aspect_ratio();
                area >= area_min
                    && area <= area_max
                    && ratio >= self.close_aspect.0
                    && ratio <= self.close_aspect.1
            })
            // Upper-right tie-break.
            .max_by_key(|b| b.center.x - b.center.y)
            .map(|b| b.center)
    }
}

impl Default for ColorLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary mask of pixels whose HSV falls inside any of the given ranges.
fn hsv_mask(frame: &Frame, ranges: &[HsvRange]) -> GrayImage {
    let (w, h) = frame.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let p = frame.image.get_pixel(x, y);
        let (hue, sat, val) = rgb_to_hsv(p.0[0], p.0[1], p.0[2]);
        if ranges.iter().any(|r| r.contains(hue, sat, val)) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// 8-connected components of a binary mask, with centroid, bounding box
/// and pixel area per component.
fn extract_blobs(mask: &GrayImage) -> Vec<Blob> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    struct Acc {
        min_x: u32,
        max_x: u32,
        min_y: u32,
        max_y: u32,
        sum_x: u64,
        sum_y: u64,
        count: u32,
    }

    let mut accs: HashMap<u32, Acc> = HashMap::new();
    for (x, y, p) in labels.enumerate_pixels() {
        let label = p.0[0];
        if label == 0 {
            continue;
        }
        let acc = accs.entry(label).or_insert(Acc {
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
            sum_x: 0,
            sum_y: 0,
            count: 0,
        });
        acc.min_x = acc.min_x.min(x);
        acc.max_x = acc.max_x.max(x);
        acc.min_y = acc.min_y.min(y);
        acc.max_y = acc.max_y.max(y);
        acc.sum_x += x as u64;
        acc.sum_y += y as u64;
        acc.count += 1;
    }

    accs.into_values()
        .map(|a| Blob {
            center: LocalPoint::new(
                (a.sum_x / a.count as u64) as i32,
                (a.sum_y / a.count as u64) as i32,
            ),
            area: a.count,
            width: a.max_x - a.min_x + 1,
            height: a.max_y - a.min_y + 1,
        })
        .collect()
}

/// RGB to HSV; hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let sat = if max == 0.0 { 0.0 } else { delta / max };
    (hue, sat, max)
}
