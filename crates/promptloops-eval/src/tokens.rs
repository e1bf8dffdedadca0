/// Estimate token count with the 4-chars-per-token heuristic.
///
/// Counts chars, not bytes, and rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
