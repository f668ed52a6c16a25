//! Text cleaning: deterministic normalisation of extracted text.
//!
//! The classifier only needs token separation, not layout, so the cleaner
//! flattens everything onto one line:
//!
//! 1. Drop control characters (code point < 32) that are not whitespace
//! 2. Collapse every whitespace run (spaces, tabs, newlines, …) into one space
//! 3. Trim both ends
//!
//! Rule 1 runs first so that removing a control character can never leave
//! two separators side by side; that keeps the function idempotent.

/// Normalise raw extracted text.
///
/// Empty or whitespace-only input yields an empty string.
///
/// ```rust
/// use mailsort::pipeline::clean::clean_text;
///
/// assert_eq!(clean_text("Too    many     spaces"), "Too many spaces");
/// assert_eq!(clean_text("   \n\n  "), "");
/// ```
pub fn clean_text(input: &str) -> String {
    let s = strip_control_chars(input);
    collapse_whitespace(&s)
}

// ── Rule 1: Strip control characters ─────────────────────────────────────────

fn strip_control_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_whitespace() || (*c as u32) >= 32)
        .collect()
}

// ── Rules 2 + 3: Collapse whitespace and trim ────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
