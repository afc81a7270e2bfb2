//! Image-intent heuristic
//!
//! A keyword match lets the relay force tool invocation up front instead of
//! waiting for the model to decide. False negatives are harmless (the model
//! still sees the tool declaration); false positives force a tool call even
//! for ambiguous phrasing, a known imprecision of substring matching.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keyword list kept as data so the predicate can be swapped for a
/// classifier later without touching the relay state machine.
pub const IMAGE_INTENT_KEYWORDS: &[&str] = &[
    "buatkan gambar",
    "generate image",
    "draw",
    "create image",
    "visualize",
];

static IMAGE_INTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?i){}", IMAGE_INTENT_KEYWORDS.join("|")))
        .expect("image intent keywords form a valid pattern")
});

pub fn is_image_intent(message: &str) -> bool {
    IMAGE_INTENT.is_match(message)
}
