//! Template matching against captured frames
//!
//! Holds the named reference images loaded at startup and locates them in
//! frames via normalized cross-correlation. A missing asset degrades the
//! run (that template never matches) instead of failing it.

use std::collections::HashMap;
use std::path::Path;

use image::GrayImage;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use crate::geometry::LocalPoint;
use crate::vision::Frame;

/// A single template hit in frame-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Center of the matched area.
    pub center: LocalPoint,
    /// Correlation score in `[0, 1]`.
    pub confidence: f32,
}

/// Registry of named reference images, immutable after load.
pub struct TemplateRegistry {
    templates: HashMap<String, GrayImage>,
    /// Minimum correlation score for a match.
    confidence_threshold: f32,
    /// Minimum pixel distance between two distinct matches in `find_all`.
    min_separation: f32,
}

impl TemplateRegistry {
    pub fn new(confidence_threshold: f32, min_separation: f32) -> Self {
        Self {
            templates: HashMap::new(),
            confidence_threshold,
            min_separation,
        }
    }

    /// Load a template image from disk.
    ///
    /// Returns false (after logging a warning) when the file is missing or
    /// unreadable; the caller may proceed in degraded mode.
    pub fn load(&mut self, name: &str, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match image::open(path) {
            Ok(img) => {
                self.templates.insert(name.to_string(), img.to_luma8());
                log::info!("Loaded template '{name}' from {}", path.display());
                true
            }
            Err(e) => {
                log::warn!("Failed to load template '{name}' from {}: {e}", path.display());
                false
            }
        }
    }

    /// Insert an in-memory template.
    pub fn insert(&mut self, name: &str, template: GrayImage) {
        self.templates.insert(name.to_string(), template);
    }

    /// Whether a template with this name was loaded successfully.
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Find the best occurrence of a named template in the frame.
    ///
    /// Returns the match center and score iff the score reaches the
    /// configured confidence threshold.
    pub fn find_best(&self, frame: &Frame, name: &str) -> Option<TemplateMatch> {
        let (scores, tw, th) = self.correlate(frame, name)?;
        let extremes = find_extremes(&scores);
        if extremes.max_value < self.confidence_threshold {
            return None;
        }
        let (x, y) = extremes.max_value_location;
        Some(TemplateMatch {
            center: LocalPoint::new(x as i32 + tw as i32 / 2, y as i32 + th as i32 / 2),
            confidence: extremes.max_value,
        })
    }

    /// Find every occurrence of a named template at or above
    /// `min_confidence`, with duplicate suppression.
    ///
    /// Correlation produces many near-identical peaks around one physical
    /// button; suppression keeps the highest-confidence candidate per
    /// `min_separation` neighborhood so one button yields one match.
    pub fn find_all(&self, frame: &Frame, name: &str, min_confidence: f32) -> Vec<TemplateMatch> {
        let Some((scores, tw, th)) = self.correlate(frame, name) else {
            return Vec::new();
        };

        let mut candidates = Vec::new();
        for (x, y, p) in scores.enumerate_pixels() {
            let score = p.0[0];
            if score >= min_confidence {
                candidates.push(TemplateMatch {
                    center: LocalPoint::new(x as i32 + tw as i32 / 2, y as i32 + th as i32 / 2),
                    confidence: score,
                });
            }
        }
        suppress_duplicates(candidates, self.min_separation)
    }

    /// Whether the named template appears in the frame.
    pub fn exists(&self, frame: &Frame, name: &str) -> bool {
        self.find_best(frame, name).is_some()
    }

    fn correlate(
        &self,
        frame: &Frame,
        name: &str,
    ) -> Option<(image::ImageBuffer<image::Luma<f32>, Vec<f32>>, u32, u32)> {
        let template = self.templates.get(name)?;
        let gray = image::imageops::grayscale(&frame.image);
        if template.width() > gray.width() || template.height() > gray.height() {
            return None;
        }
        let scores = match_template(
            &gray,
            template,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        Some((scores, template.width(), template.height()))
    }
}

/// Greedy duplicate suppression: sort by descending confidence and keep a
/// candidate only if it is farther than `min_separation` from every match
/// already kept.
fn suppress_duplicates(mut candidates: Vec<TemplateMatch>, min_separation: f32) -> Vec<TemplateMatch> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut kept: Vec<TemplateMatch> = Vec::new();
    for candidate in candidates {
        if kept
            .iter()
            .all(|m| m.center.distance(candidate.center) > min_separation)
        {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgba, RgbaImage};

    /// A frame with a distinctive checker pattern embedded at (x, y).
    fn frame_with_pattern(x: u32, y: u32) -> (Frame, GrayImage) {
        let pattern: GrayImage = ImageBuffer::from_fn(8, 8, |px, py| {
            if (px + py) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let frame_img: RgbaImage = ImageBuffer::from_fn(64, 64, |fx, fy| {
            let inside = fx >= x && fx < x + 8 && fy >= y && fy < y + 8;
            if inside {
                let v = pattern.get_pixel(fx - x, fy - y).0[0];
                Rgba([v, v, v, 255])
            } else {
                Rgba([128, 128, 128, 255])
            }
        });
        (Frame::new(frame_img, None), pattern)
    }

    #[test]
    fn test_find_best_exact_subimage() {
        let (frame, pattern) = frame_with_pattern(20, 30);
        let mut registry = TemplateRegistry::new(0.8, 20.0);
        registry.insert("checker", pattern);

        let m = registry.find_best(&frame, "checker").expect("should match");
        // Exact sub-image: correlation is ~1.0 and the center lands on the
        // embedded pattern.
        assert!(m.confidence > 0.99);
        assert_eq!(m.center, LocalPoint::new(24, 34));
    }

    #[test]
    fn test_find_best_threshold_rejects() {
        let (frame, pattern) = frame_with_pattern(20, 30);
        // Threshold above the achievable correlation of 1.0 is impossible
        // to reach.
        let mut registry = TemplateRegistry::new(1.1, 20.0);
        registry.insert("checker", pattern);
        assert!(registry.find_best(&frame, "checker").is_none());
    }

    #[test]
    fn test_find_best_unknown_template() {
        let (frame, _) = frame_with_pattern(0, 0);
        let registry = TemplateRegistry::new(0.8, 20.0);
        assert!(registry.find_best(&frame, "missing").is_none());
    }

    #[test]
    fn test_load_missing_file_returns_false() {
        let mut registry = TemplateRegistry::new(0.8, 20.0);
        assert!(!registry.load("ghost", "/nonexistent/ghost.png"));
        assert!(!registry.contains("ghost"));
    }

    #[test]
    fn test_suppress_duplicates_keeps_strongest() {
        // N overlapping candidates within the suppression radius of one
        // true position collapse to the single strongest one.
        let cluster = vec![
            TemplateMatch {
                center: LocalPoint::new(100, 100),
                confidence: 0.91,
            },
            TemplateMatch {
                center: LocalPoint::new(103, 101),
                confidence: 0.97,
            },
            TemplateMatch {
                center: LocalPoint::new(98, 99),
                confidence: 0.85,
            },
            TemplateMatch {
                center: LocalPoint::new(105, 105),
                confidence: 0.88,
            },
        ];
        let kept = suppress_duplicates(cluster, 20.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].center, LocalPoint::new(103, 101));
        assert!((kept[0].confidence - 0.97).abs() < f32::EPSILON);
    }

    #[test]
    fn test_suppress_duplicates_keeps_distant_matches() {
        let spread = vec![
            TemplateMatch {
                center: LocalPoint::new(10, 10),
                confidence: 0.9,
            },
            TemplateMatch {
                center: LocalPoint::new(200, 10),
                confidence: 0.85,
            },
        ];
        let kept = suppress_duplicates(spread, 20.0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_find_all_collapses_correlation_plateau() {
        let (frame, pattern) = frame_with_pattern(20, 30);
        let mut registry = TemplateRegistry::new(0.8, 20.0);
        registry.insert("checker", pattern);

        // A single physical pattern must come back as one logical match
        // despite neighboring high-correlation offsets.
        let matches = registry.find_all(&frame, "checker", 0.8);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].center, LocalPoint::new(24, 34));
    }
}
