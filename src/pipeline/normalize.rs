//! Text normalization applied before keyword matching.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Lower-case, collapse whitespace runs, blank out punctuation, trim.
///
/// Punctuation is replaced after whitespace is collapsed, so `"a, b"`
/// becomes `"a  b"` (two spaces). Keyword phrases rely on this order.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = WHITESPACE.replace_all(&lowered, " ");
    let stripped = NON_WORD.replace_all(&collapsed, " ");
    stripped.trim().to_string()
}
