//! Substring and anchored pattern retrieval.
//!
//! The matching rules behind parameter operations like `${var#pat}`,
//! `${var%pat}`, and `${var//pat/repl}`: anchor a pattern at the start or
//! end of a string, or scan for it as a substring, pick the longest or
//! shortest acceptance, optionally replace every non-overlapping occurrence,
//! and assemble the requested mix of matched text, remainder, and numeric
//! position fields.
//!
//! The pattern engine is longest-match-native, so shortest-match requests
//! re-probe with successively truncated end points, and end-anchored
//! matches probe every character offset moving forward (offsets cannot be
//! computed arithmetically with multibyte characters).

use bitflags::bitflags;

use shglob_pattern::{CompileFlags, Pattern};

use crate::GlobError;

bitflags! {
    /// Behavior flags for [`extract_match`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MatchFlags: u32 {
        /// Anchor the match at the start of the string.
        const START = 1 << 0;
        /// Anchor the match at the end of the string.
        const END = 1 << 1;
        /// Prefer the longest acceptance.
        const LONG = 1 << 2;
        /// Prefer the shortest acceptance.
        const SHORT = 1 << 3;
        /// Scan for the pattern anywhere in the string.
        const SUBSTR = 1 << 4;
        /// Scan from the end: the rightmost occurrence wins.
        const SCAN_FROM_END = 1 << 5;
        /// Replace every non-overlapping occurrence.
        const GLOBAL = 1 << 6;
        /// Include the matched substring in the result.
        const WANT_MATCHED = 1 << 7;
        /// Include the unmatched remainder (with any replacement spliced
        /// in at the match site).
        const WANT_REST = 1 << 8;
        /// Include the 1-based character position of the match start.
        const WANT_BEGIN = 1 << 9;
        /// Include the 1-based character position of the match end.
        const WANT_END = 1 << 10;
        /// Include the character length of the match.
        const WANT_LEN = 1 << 11;
        /// On no match, succeed with the input string as the result
        /// (the `${var#pat}` fallback) instead of reporting failure.
        const KEEP_ON_FAIL = 1 << 12;
    }
}

/// One match site: a half-open byte span and the text to splice there.
#[derive(Debug, Clone, PartialEq)]
pub struct Repldata {
    pub begin: usize,
    pub end: usize,
    pub repl: Option<String>,
}

/// Apply a pattern to a string under the given flags.
///
/// `occurrence` selects the Nth acceptance (1-based, 0 treated as 1) when
/// scanning; anchored modes have a single candidate and ignore it.
/// `replacement` is spliced over the match site(s) for
/// [`MatchFlags::WANT_REST`] results.
///
/// Returns `Ok(None)` when nothing matched and
/// [`MatchFlags::KEEP_ON_FAIL`] was not set.
///
/// # Examples
/// ```
/// use shglob::subst::{extract_match, MatchFlags};
///
/// // ${var%%.*}: longest suffix match removed
/// let flags = MatchFlags::END | MatchFlags::LONG | MatchFlags::WANT_REST;
/// let out = extract_match("archive.tar.gz", ".*", flags, 0, None).unwrap();
/// assert_eq!(out.as_deref(), Some("archive"));
/// ```
pub fn extract_match(
    s: &str,
    pattern_text: &str,
    flags: MatchFlags,
    occurrence: usize,
    replacement: Option<&str>,
) -> Result<Option<String>, GlobError> {
    let pat = Pattern::compile(
        pattern_text,
        CompileFlags {
            reusable: true,
            scan: true,
        },
    )
    .map_err(|e| GlobError::BadPattern(e.to_string()))?;

    // Must-match literal pre-filter: a literal run the pattern requires
    // has to appear somewhere before a full trial is worth attempting.
    if let Some(lit) = pat.must_literal() {
        if !s.contains(lit) {
            return Ok(no_match(s, flags));
        }
    }

    let spans = find_spans(s, &pat, flags, occurrence);
    if spans.is_empty() {
        return Ok(no_match(s, flags));
    }

    let repls: Vec<Repldata> = spans
        .iter()
        .map(|&(begin, end)| Repldata {
            begin,
            end,
            repl: replacement.map(String::from),
        })
        .collect();

    Ok(Some(assemble(s, &repls, flags)))
}

/// Array-broadcast variant: the same pattern against every element.
///
/// Elements that do not match pass through unchanged, mirroring how
/// parameter operations behave on arrays.
pub fn extract_match_all(
    items: &[String],
    pattern_text: &str,
    flags: MatchFlags,
    occurrence: usize,
    replacement: Option<&str>,
) -> Result<Vec<String>, GlobError> {
    items
        .iter()
        .map(|item| {
            extract_match(item, pattern_text, flags, occurrence, replacement)
                .map(|out| out.unwrap_or_else(|| item.clone()))
        })
        .collect()
}

fn no_match(s: &str, flags: MatchFlags) -> Option<String> {
    flags
        .contains(MatchFlags::KEEP_ON_FAIL)
        .then(|| s.to_string())
}

/// Locate the match span(s) as half-open byte ranges.
fn find_spans(s: &str, pat: &Pattern, flags: MatchFlags, occurrence: usize) -> Vec<(usize, usize)> {
    if flags.contains(MatchFlags::GLOBAL) || flags.contains(MatchFlags::SUBSTR) {
        let mut spans = scan_forward(s, pat, flags);
        if flags.contains(MatchFlags::SCAN_FROM_END) {
            spans.reverse();
        }
        if flags.contains(MatchFlags::GLOBAL) {
            return spans;
        }
        let idx = occurrence.max(1) - 1;
        return spans.get(idx).copied().into_iter().collect();
    }

    let anchored_span = if flags.contains(MatchFlags::START) && flags.contains(MatchFlags::END) {
        pat.try_match_at(s, 0, true).map(|len| (0, len))
    } else if flags.contains(MatchFlags::START) {
        if flags.contains(MatchFlags::SHORT) {
            shortest_at(s, pat, 0).map(|len| (0, len))
        } else {
            pat.try_match_at(s, 0, false).map(|len| (0, len))
        }
    } else if flags.contains(MatchFlags::END) {
        // Probe every start offset moving forward; the first acceptance is
        // the longest suffix, the last is the shortest.
        let mut accepted = Vec::new();
        for b in boundaries(s) {
            if pat.try_match_at(s, b, true).is_some() {
                accepted.push(b);
            }
        }
        let pick = if flags.contains(MatchFlags::SHORT) {
            accepted.last()
        } else {
            accepted.first()
        };
        pick.map(|&b| (b, s.len()))
    } else {
        // No anchor and no scan request: treat as a whole-string match.
        pat.try_match_at(s, 0, true).map(|len| (0, len))
    };

    anchored_span.into_iter().collect()
}

/// Left-to-right non-overlapping scan. An empty acceptance advances by one
/// character so the scan always makes progress.
fn scan_forward(s: &str, pat: &Pattern, flags: MatchFlags) -> Vec<(usize, usize)> {
    let bounds = boundaries(s);
    let mut spans = Vec::new();
    let mut bi = 0;

    while bi < bounds.len() {
        let b = bounds[bi];
        if b >= s.len() && !s.is_empty() {
            break;
        }
        let len = if flags.contains(MatchFlags::SHORT) {
            shortest_at(s, pat, b)
        } else {
            pat.try_match_at(s, b, false)
        };
        match len {
            Some(len) if len > 0 => {
                spans.push((b, b + len));
                while bi < bounds.len() && bounds[bi] < b + len {
                    bi += 1;
                }
            }
            Some(_) => {
                spans.push((b, b));
                bi += 1;
            }
            None => bi += 1,
        }
        if s.is_empty() {
            break;
        }
    }

    spans
}

/// Shortest acceptance at a fixed start: re-probe truncated end points in
/// ascending order until one matches.
fn shortest_at(s: &str, pat: &Pattern, b: usize) -> Option<usize> {
    for e in boundaries(s).into_iter().filter(|&e| e >= b) {
        if pat.try_match_at(&s[..e], b, true).is_some() {
            return Some(e - b);
        }
    }
    None
}

/// Every char boundary in `s`, including the end.
fn boundaries(s: &str) -> Vec<usize> {
    let mut bounds: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
    bounds.push(s.len());
    bounds
}

/// Assemble the requested fields: numeric parts first, then the matched
/// substring, then the remainder, space-joined.
fn assemble(s: &str, repls: &[Repldata], flags: MatchFlags) -> String {
    let mut parts: Vec<String> = Vec::new();
    let first = &repls[0];

    if flags.contains(MatchFlags::WANT_BEGIN) {
        parts.push((char_pos(s, first.begin) + 1).to_string());
    }
    if flags.contains(MatchFlags::WANT_END) {
        parts.push(char_pos(s, first.end).to_string());
    }
    if flags.contains(MatchFlags::WANT_LEN) {
        parts.push(s[first.begin..first.end].chars().count().to_string());
    }
    if flags.contains(MatchFlags::WANT_MATCHED) {
        let matched: Vec<&str> = repls.iter().map(|r| &s[r.begin..r.end]).collect();
        parts.push(matched.join(" "));
    }
    if flags.contains(MatchFlags::WANT_REST) {
        // All recorded spans splice into one output in a single pass.
        let mut out = String::new();
        let mut last = 0;
        for r in repls {
            out.push_str(&s[last..r.begin]);
            if let Some(ref repl) = r.repl {
                out.push_str(repl);
            }
            last = r.end;
        }
        out.push_str(&s[last..]);
        parts.push(out);
    }

    parts.join(" ")
}

fn char_pos(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}
