//! Text utilities for context budgeting and title comparison.

/// Truncate a string to at most `max_chars` characters, on a char boundary.
///
/// Returns the input unchanged when it already fits.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    s.chars().take(max_chars).collect()
}

/// Truncate to `max_chars` and append an ellipsis when shortened.
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Normalize a lesson title for exclusion comparison.
///
/// Lowercases, trims, and collapses internal whitespace runs so that
/// cosmetic differences don't defeat the repeat filter.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
