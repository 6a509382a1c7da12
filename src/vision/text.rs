//! Text location over OCR word boxes
//!
//! Matching is deliberately forgiving: the game's font and backdrop make
//! Tesseract clip leading characters and split labels across tokens, so
//! queries are matched exactly, then against clipped-suffix patterns, then
//! against sliding windows of consecutive words.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::geometry::{BoundingBox, LocalPoint};
use crate::vision::ocr::Word;

/// Words that name a shop category rather than a specific item. A category
/// word alone never identifies a purchase target; matching on one would
/// pair every "... Seed" row with every seed target.
static CATEGORY_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "seed", "seeds", "pod", "pods", "bean", "beans", "egg", "eggs",
    ])
});

/// Minimum length for a query word (and its clipped suffixes) to take part
/// in fuzzy matching; shorter fragments match everything.
const MIN_PATTERN_LEN: usize = 4;

/// Maximum number of leading characters OCR is assumed to clip.
const MAX_CLIP: usize = 3;

/// An item row paired with its stock marker.
#[derive(Debug, Clone, PartialEq)]
pub struct StockItem {
    /// The configured target name that matched.
    pub name: String,
    /// Frame-local position of the matched name token.
    pub position: LocalPoint,
}

/// Locates query strings in OCR output.
pub struct TextLocator {
    /// The token marking an in-stock shop row.
    stock_marker: String,
    /// Maximum vertical distance between a stock marker and the item name
    /// on the same row.
    stock_row_proximity: i32,
}

impl TextLocator {
    pub fn new(stock_marker: impl Into<String>, stock_row_proximity: i32) -> Self {
        Self {
            stock_marker: stock_marker.into().to_uppercase(),
            stock_row_proximity,
        }
    }

    /// Find the first word box matching `query`.
    ///
    /// Policy, in order: exact case-insensitive substring either direction
    /// on a single word; clipped-suffix patterns when `fuzzy` is set;
    /// multi-word sliding windows. First match wins, no scoring.
    pub fn find(&self, words: &[Word], query: &str, fuzzy: bool) -> Option<BoundingBox> {
        let query_lower = query.to_lowercase();

        // (a) exact, either direction
        for w in words {
            if contains_either(&w.text.to_lowercase(), &query_lower) {
                return Some(w.bbox);
            }
        }

        // (b) clipped-suffix patterns
        if fuzzy {
            let patterns = clipped_patterns(&query_lower, false);
            for w in words {
                let text = w.text.to_lowercase();
                if patterns.iter().any(|p| contains_either(&text, p)) {
                    return Some(w.bbox);
                }
            }
        }

        // (c) sliding windows over consecutive words
        self.find_in_windows(words, &query_lower)
    }

    /// Exhaustive variant of [`Self::find`] without early return; used for
    /// auditing and debugging only.
    pub fn find_all(&self, words: &[Word], query: &str, fuzzy: bool) -> Vec<BoundingBox> {
        let query_lower = query.to_lowercase();
        let patterns = if fuzzy {
            clipped_patterns(&query_lower, false)
        } else {
            Vec::new()
        };

        let mut found = Vec::new();
        for w in words {
            let text = w.text.to_lowercase();
            if contains_either(&text, &query_lower)
                || patterns.iter().any(|p| contains_either(&text, p))
            {
                found.push(w.bbox);
            }
        }
        if let Some(bbox) = self.find_in_windows(words, &query_lower) {
            if !found.contains(&bbox) {
                found.push(bbox);
            }
        }
        found
    }

    /// Whether `query` appears anywhere in the OCR output.
    pub fn exists(&self, words: &[Word], query: &str) -> bool {
        self.find(words, query, true).is_some()
    }

    /// Whether the full phrase appears, inside one token or across adjacent
    /// tokens. Unlike [`Self::find`], a token matching only part of the
    /// phrase does not count. Markers like the sold-out text must use this:
    /// their trailing word also appears alone on every in-stock row.
    pub fn exists_phrase(&self, words: &[Word], phrase: &str) -> bool {
        let phrase_lower = phrase.to_lowercase();
        if words
            .iter()
            .any(|w| w.text.to_lowercase().contains(&phrase_lower))
        {
            return true;
        }
        self.find_in_windows(words, &phrase_lower).is_some()
    }

    /// Pair every in-stock shop row with a matching purchase target.
    ///
    /// A row is a stock-marker token (tolerating one clipped variant) plus
    /// an item-name token within the configured vertical proximity. The
    /// name token must match a cultivar-specific pattern; generic category
    /// words are excluded from being the sole match key.
    pub fn find_shop_items_with_stock(&self, words: &[Word], targets: &[&str]) -> Vec<StockItem> {
        let markers: Vec<&Word> = words
            .iter()
            .filter(|w| self.is_stock_marker(w) && !Self::is_negated(words, w))
            .collect();
        if markers.is_empty() {
            return Vec::new();
        }

        let mut items: Vec<StockItem> = Vec::new();
        for target in targets {
            let patterns = clipped_patterns(&target.to_lowercase(), true);
            if patterns.is_empty() {
                continue;
            }

            'rows: for marker in &markers {
                for w in words {
                    if (w.bbox.y - marker.bbox.y).abs() > self.stock_row_proximity {
                        continue;
                    }
                    let text = w.text.to_lowercase();
                    if CATEGORY_WORDS.contains(text.as_str()) {
                        continue;
                    }
                    if patterns.iter().any(|p| contains_either(&text, p)) {
                        if !items.iter().any(|i| i.name == *target) {
                            items.push(StockItem {
                                name: target.to_string(),
                                position: w.bbox.center(),
                            });
                        }
                        break 'rows;
                    }
                }
            }
        }
        items
    }

    fn is_stock_marker(&self, w: &Word) -> bool {
        let text = w.text.to_uppercase();
        let trimmed = text.trim_matches(|c: char| !c.is_ascii_alphanumeric());
        // One clipped variant: the marker with its first character eaten.
        trimmed == self.stock_marker
            || self
                .stock_marker
                .get(1..)
                .is_some_and(|clipped| trimmed == clipped)
    }

    /// A marker whose nearest left neighbor on the same line reads "NO" is
    /// the tail of a sold-out label, not an in-stock row.
    fn is_negated(words: &[Word], marker: &Word) -> bool {
        words
            .iter()
            .filter(|w| {
                w.bbox.x < marker.bbox.x
                    && (w.bbox.y - marker.bbox.y).abs() <= marker.bbox.height.max(1) as i32
            })
            .max_by_key(|w| w.bbox.x)
            .is_some_and(|left| {
                left.text
                    .trim_matches(|c: char| !c.is_ascii_alphanumeric())
                    .eq_ignore_ascii_case("NO")
            })
    }

    fn find_in_windows(&self, words: &[Word], query_lower: &str) -> Option<BoundingBox> {
        let query_words = query_lower.split_whitespace().count();
        // One extra word of slack for labels OCR splits mid-word.
        let max_window = (query_words + 1).max(2).min(words.len());
        for size in 2..=max_window {
            for window in words.windows(size) {
                let joined = window
                    .iter()
                    .map(|w| w.text.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(" ");
                if joined.contains(query_lower) {
                    return Some(union_bbox(window));
                }
            }
        }
        None
    }
}

impl Default for TextLocator {
    fn default() -> Self {
        Self::new("STOCK", 60)
    }
}

/// Substring containment in either direction, the base fuzzy primitive.
fn contains_either(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Pattern set for one query: for each query word of sufficient length, the
/// full word plus every suffix produced by clipping 1..=3 leading
/// characters. `specific_only` drops category words, leaving only tokens
/// that identify the cultivar.
fn clipped_patterns(query_lower: &str, specific_only: bool) -> Vec<String> {
    let mut patterns = Vec::new();
    for word in query_lower.split_whitespace() {
        if word.len() < MIN_PATTERN_LEN {
            continue;
        }
        if specific_only && CATEGORY_WORDS.contains(word) {
            continue;
        }
        patterns.push(word.to_string());
        for clip in 1..=MAX_CLIP {
            if word.len() - clip >= MIN_PATTERN_LEN {
                patterns.push(word[clip..].to_string());
            }
        }
    }
    patterns
}

fn union_bbox(words: &[Word]) -> BoundingBox {
    let left = words.iter().map(|w| w.bbox.x).min().unwrap_or(0);
    let top = words.iter().map(|w| w.bbox.y).min().unwrap_or(0);
    let right = words
        .iter()
        .map(|w| w.bbox.x + w.bbox.width as i32)
        .max()
        .unwrap_or(0);
    let bottom = words
        .iter()
        .map(|w| w.bbox.y + w.bbox.height as i32)
        .max()
        .unwrap_or(0);
    BoundingBox {
        x: left,
        y: top,
        width: (right - left).max(0) as u32,
        height: (bottom - top).max(0) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: i32, y: i32) -> Word {
        Word::new(text, x, y, 60, 14)
    }

    #[test]
    fn test_exact_match_either_direction() {
        let locator = TextLocator::default();
        let words = [word("Sunflower", 10, 10)];
        assert!(locator.find(&words, "Sunflower Seed", false).is_some());
        assert!(locator.find(&words, "sunflower", false).is_some());
        assert!(locator.find(&words, "Cactus", false).is_none());
    }

    #[test]
    fn test_fuzzy_matches_clipped_token() {
        let locator = TextLocator::default();
        // OCR clipped the leading "Str" and glued on a comma; exact
        // containment fails, the suffix pattern still hits.
        let words = [word("awberry,", 10, 10)];
        assert!(locator.find(&words, "Strawberry Seed", true).is_some());
        assert!(locator.find(&words, "Strawberry Seed", false).is_none());
    }

    #[test]
    fn test_sliding_window_spans_tokens() {
        let locator = TextLocator::default();
        // OCR glued a stray glyph onto both tokens, so neither matches the
        // query on its own; only the joined window does.
        let words = [
            word("xMythical", 10, 10),
            word("Eggx", 80, 10),
            word("150", 150, 10),
        ];
        let bbox = locator
            .find(&words, "Mythical Egg", false)
            .expect("window should match");
        // Union box covers both tokens.
        assert_eq!(bbox.x, 10);
        assert!(bbox.width >= 130);
    }

    #[test]
    fn test_single_token_matches_before_window() {
        let locator = TextLocator::default();
        // First-match-wins: the lone "Mythical" token satisfies the query at
        // the single-word stage, so its own box comes back.
        let words = [word("Mythical", 10, 10), word("Egg", 80, 10)];
        let bbox = locator
            .find(&words, "Mythical Egg", false)
            .expect("token should match");
        assert_eq!(bbox.x, 10);
        assert_eq!(bbox.width, 60);
    }

    #[test]
    fn test_find_all_returns_every_hit() {
        let locator = TextLocator::default();
        let words = [
            word("Sunflower", 10, 10),
            word("150", 100, 10),
            word("Sunflower", 10, 200),
        ];
        let boxes = locator.find_all(&words, "Sunflower Seed", true);
        assert_eq!(boxes.len(), 2);
    }

    #[test]
    fn test_exists_stock_marker() {
        let locator = TextLocator::default();
        let words = [word("NO", 10, 10), word("STOCK", 40, 10)];
        assert!(locator.exists(&words, "NO STOCK"));
    }

    #[test]
    fn test_phrase_requires_adjacent_tokens() {
        let locator = TextLocator::default();
        // A bare row marker must not read as the sold-out label: the "STOCK"
        // token is on screen for every in-stock row.
        let in_stock = [
            word("Sunflower", 20, 100),
            word("X4", 150, 100),
            word("STOCK", 200, 100),
        ];
        assert!(!locator.exists_phrase(&in_stock, "NO STOCK"));

        let sold_out = [word("NO", 170, 100), word("STOCK", 200, 100)];
        assert!(locator.exists_phrase(&sold_out, "NO STOCK"));
        // A single glued token counts too.
        let glued = [word("NO STOCK", 170, 100)];
        assert!(locator.exists_phrase(&glued, "NO STOCK"));
    }

    #[test]
    fn test_stock_row_pairs_within_proximity() {
        let locator = TextLocator::default();
        let words = [word("STOCK", 200, 100), word("Sunflower", 20, 130)];
        let items = locator.find_shop_items_with_stock(&words, &["Sunflower Seed"]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Sunflower Seed");
    }

    #[test]
    fn test_stock_row_rejects_distant_name() {
        let locator = TextLocator::default();
        let words = [word("STOCK", 200, 100), word("Sunflower", 20, 300)];
        let items = locator.find_shop_items_with_stock(&words, &["Sunflower Seed"]);
        assert!(items.is_empty());
    }

    #[test]
    fn test_category_word_is_never_sole_match_key() {
        let locator = TextLocator::default();
        // The row reads "... Seed" but carries no cultivar token; no
        // target may claim it through the category word alone.
        let words = [word("STOCK", 200, 100), word("Seed", 20, 110)];
        let items = locator
            .find_shop_items_with_stock(&words, &["Strawberry Seed", "Cactus Seed"]);
        assert!(items.is_empty());
    }

    #[test]
    fn test_cultivar_token_pairs_despite_clipping() {
        let locator = TextLocator::default();
        let words = [
            word("STOCK", 200, 100),
            word("Seed", 90, 110),
            word("awberry", 20, 110),
        ];
        let items = locator.find_shop_items_with_stock(&words, &["Strawberry Seed"]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].position, LocalPoint::new(50, 117));
    }

    #[test]
    fn test_truncated_stock_marker_tolerated() {
        let locator = TextLocator::default();
        let words = [word("TOCK", 200, 100), word("Dawnbinder", 20, 120)];
        let items = locator.find_shop_items_with_stock(&words, &["Dawnbinder Pod"]);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_sold_out_row_is_not_paired() {
        let locator = TextLocator::default();
        // The row's marker is the tail of "NO STOCK"; it must not pair the
        // item name next to it.
        let words = [
            word("Sunflower", 20, 100),
            word("NO", 170, 100),
            word("STOCK", 200, 100),
        ];
        let items = locator.find_shop_items_with_stock(&words, &["Sunflower Seed"]);
        assert!(items.is_empty());
    }

    #[test]
    fn test_one_item_reported_once_per_scan() {
        let locator = TextLocator::default();
        let words = [
            word("STOCK", 200, 100),
            word("STOCK", 200, 140),
            word("Cactus", 20, 110),
        ];
        let items = locator.find_shop_items_with_stock(&words, &["Cactus Seed"]);
        assert_eq!(items.len(), 1);
    }
}
