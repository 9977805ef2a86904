use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Lower-cases `value` and strips diacritics (canonical decomposition, combining marks dropped)
/// so that e.g. `"Reseña"` and `"resena"` collapse onto the same key.
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .flat_map(char::to_lowercase)
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect()
}

/// Whether `ch` may appear inside a tag body (after the `#`).
///
/// Combining marks are allowed so that a decomposed `n` + `U+0303` is not cut in half.
#[inline]
pub fn is_tag_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || is_combining_mark(ch)
}
