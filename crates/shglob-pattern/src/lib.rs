//! shglob-pattern: Single-segment glob pattern compilation and matching.
//!
//! Provides:
//! - **Pattern**: a compiled glob pattern for one path segment (or one
//!   parameter-substitution pattern), tried against strings at arbitrary
//!   byte offsets
//! - **contains_glob**: quick metacharacter probe
//!
//! Supported syntax:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]` / `[a-z]` matches any character in the set or range
//! - `[!abc]` or `[^abc]` matches any character NOT in the set
//! - `{a,b,c}` alternation (expanded at compile time)
//! - `\` escapes the next character
//! - a leading `(#aN)` grants an error budget of N for approximate matching
//!
//! Matching is longest-match-native: an unanchored trial reports the longest
//! length the pattern can consume at the given offset. Callers that need the
//! shortest match re-probe with truncated inputs.

mod pattern;

pub use pattern::{CompileFlags, Pattern, PatternError};

/// Check if a string contains glob metacharacters (`*`, `?`, `[`).
///
/// Useful for callers that want to detect when a path argument is a glob
/// pattern and switch to pattern-matching mode.
///
/// ```
/// use shglob_pattern::contains_glob;
/// assert!(contains_glob("*.rs"));
/// assert!(contains_glob("src/[ab]*.txt"));
/// assert!(!contains_glob("src/main.rs"));
/// ```
pub fn contains_glob(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}
