//! Compiled glob patterns and the matching core.
//!
//! A pattern is compiled once into a small token program, then tried many
//! times against candidate strings. Brace alternation is expanded at compile
//! time, so a compiled pattern is a set of token sequences and a trial
//! succeeds when any sequence accepts.

use std::cell::Cell;

use thiserror::Error;

/// Maximum number of recursive calls for one match trial. Protects against
/// adversarial patterns like `*a*a*a*...*a` that cause O(n^k) backtracking.
/// Counted as total work (calls), not stack depth, to bound actual CPU cost.
const MAX_MATCH_CALLS: usize = 100_000;

/// Errors when compiling glob patterns.
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,
    #[error("invalid pattern: {0}")]
    Invalid(String),
}

/// Compile-time options.
///
/// `reusable` marks a pattern that will be tried many times (a path-component
/// pattern in a directory scan); it enables precomputation of the must-match
/// literal used as a fast pre-filter. `scan` compiles the pattern without the
/// implicit end-of-string anchor, for callers that anchor explicitly per
/// trial (substring scanning).
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileFlags {
    /// Pattern will be reused across many trials.
    pub reusable: bool,
    /// Disable the implicit end-of-string anchor.
    pub scan: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Literal(char),
    /// `?`
    AnyChar,
    /// `*`
    AnySpan,
    Class { negate: bool, items: Vec<ClassItem> },
}

#[derive(Debug, Clone, PartialEq)]
enum ClassItem {
    Single(char),
    Range(char, char),
}

impl Tok {
    fn hits(&self, c: char) -> bool {
        match self {
            Tok::Literal(l) => *l == c,
            Tok::AnyChar => true,
            Tok::AnySpan => true,
            Tok::Class { negate, items } => {
                let found = items.iter().any(|item| match item {
                    ClassItem::Single(s) => *s == c,
                    ClassItem::Range(lo, hi) => c >= *lo && c <= *hi,
                });
                found != *negate
            }
        }
    }
}

/// A compiled glob pattern for a single segment.
///
/// # Examples
/// ```
/// use shglob_pattern::{CompileFlags, Pattern};
///
/// let pat = Pattern::compile("*.rs", CompileFlags::default()).unwrap();
/// assert!(pat.matches("main.rs"));
/// assert!(!pat.matches("main.go"));
///
/// let pat = Pattern::compile("*.{rs,go}", CompileFlags::default()).unwrap();
/// assert!(pat.matches("main.go"));
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    alternatives: Vec<Vec<Tok>>,
    text: String,
    approx: usize,
    scan: bool,
    literal: Option<String>,
    must: Option<String>,
}

impl Pattern {
    /// Compile a pattern string.
    ///
    /// A leading `(#aN)` sets the approximate-match error budget reported by
    /// [`Pattern::approx`]; the scanner threads that budget through
    /// [`Pattern::try_match_errors`].
    pub fn compile(text: &str, flags: CompileFlags) -> Result<Pattern, PatternError> {
        if text.is_empty() {
            return Err(PatternError::Empty);
        }

        let (approx, rest) = parse_approx_prefix(text)?;
        if rest.is_empty() {
            return Err(PatternError::Invalid(format!(
                "nothing follows approximation directive in '{}'",
                text
            )));
        }

        let alternatives: Vec<Vec<Tok>> = expand_alternation(rest)
            .iter()
            .map(|alt| tokenize(alt))
            .collect();

        let literal = single_literal(&alternatives);
        let must = if flags.reusable && literal.is_none() {
            must_match_literal(&alternatives)
        } else {
            None
        };

        Ok(Pattern {
            alternatives,
            text: text.to_string(),
            approx,
            scan: flags.scan,
            literal,
            must,
        })
    }

    /// The original pattern text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Error budget granted by a leading `(#aN)` directive (0 = exact).
    pub fn approx(&self) -> usize {
        self.approx
    }

    /// True if the compiled program is a plain literal with no wildcards.
    pub fn is_literal(&self) -> bool {
        self.literal.is_some()
    }

    /// The literal string, when [`Pattern::is_literal`] is true.
    pub fn literal(&self) -> Option<&str> {
        self.literal.as_deref()
    }

    /// A literal substring every match must contain, when one was
    /// precomputed. Used as a cheap pre-filter before a full trial.
    pub fn must_literal(&self) -> Option<&str> {
        self.must.as_deref()
    }

    /// True if some alternative begins with a literal `.`.
    ///
    /// Filename generation refuses to let wildcards match a leading dot
    /// unless the pattern spells the dot out (or the glob-dots option is on).
    pub fn leading_literal_dot(&self) -> bool {
        self.alternatives
            .iter()
            .any(|alt| matches!(alt.first(), Some(Tok::Literal('.'))))
    }

    /// Whole-string test, anchored at both ends.
    pub fn matches(&self, s: &str) -> bool {
        let chars: Vec<char> = s.chars().collect();
        let calls = Cell::new(0usize);
        self.alternatives
            .iter()
            .any(|alt| match_through(alt, 0, &chars, 0, &calls))
    }

    /// Try the pattern at `offset` (a byte index into `s`).
    ///
    /// Returns the byte length of the longest match starting there, or `None`.
    /// With `anchored_end` the match must extend to the end of `s`. Patterns
    /// compiled without [`CompileFlags::scan`] behave as if `anchored_end`
    /// were always set, matching the implicit anchor of filename generation.
    pub fn try_match_at(&self, s: &str, offset: usize, anchored_end: bool) -> Option<usize> {
        let rest = s.get(offset..)?;
        let chars: Vec<char> = rest.chars().collect();
        let calls = Cell::new(0usize);
        let to_end = anchored_end || !self.scan;

        let mut best: Option<usize> = None;
        for alt in &self.alternatives {
            let end = if to_end {
                if match_through(alt, 0, &chars, 0, &calls) {
                    Some(chars.len())
                } else {
                    None
                }
            } else {
                longest_end(alt, 0, &chars, 0, &calls)
            };
            if let Some(e) = end {
                best = Some(best.map_or(e, |b: usize| b.max(e)));
            }
        }

        best.map(|end_chars| chars[..end_chars].iter().map(|c| c.len_utf8()).sum())
    }

    /// Whole-string approximate trial.
    ///
    /// Returns the minimum number of single-character errors (substitution,
    /// insertion, deletion) needed for the pattern to accept `s`, if that
    /// minimum is within `budget`. A budget of zero is an exact trial.
    pub fn try_match_errors(&self, s: &str, budget: usize) -> Option<usize> {
        if budget == 0 {
            return if self.matches(s) { Some(0) } else { None };
        }
        let chars: Vec<char> = s.chars().collect();
        let calls = Cell::new(0usize);
        self.alternatives
            .iter()
            .filter_map(|alt| min_errors(alt, 0, &chars, 0, budget, &calls))
            .min()
    }
}

/// Parse a leading `(#aN)` approximation directive.
fn parse_approx_prefix(text: &str) -> Result<(usize, &str), PatternError> {
    let Some(rest) = text.strip_prefix("(#a") else {
        return Ok((0, text));
    };
    let close = rest
        .find(')')
        .ok_or_else(|| PatternError::Invalid(format!("unterminated '(#a' in '{}'", text)))?;
    let digits = &rest[..close];
    let n: usize = digits
        .parse()
        .map_err(|_| PatternError::Invalid(format!("bad error count '{}' in '{}'", digits, text)))?;
    Ok((n, &rest[close + 1..]))
}

/// Expand `{a,b,c}` alternation into separate pattern strings.
///
/// The first top-level brace group is split and each alternative recursively
/// expanded; nesting is honored. Unclosed braces are left as literal text.
fn expand_alternation(pattern: &str) -> Vec<String> {
    let chars: Vec<char> = pattern.chars().collect();

    let mut depth = 0;
    let mut brace_start = None;
    let mut brace_end = None;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => {
                if depth == 0 {
                    brace_start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 && brace_start.is_some() {
                        brace_end = Some(i);
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    let (start, end) = match (brace_start, brace_end) {
        (Some(s), Some(e)) => (s, e),
        _ => return vec![pattern.to_string()],
    };

    let prefix: String = chars[..start].iter().collect();
    let suffix: String = chars[end + 1..].iter().collect();
    let content: String = chars[start + 1..end].iter().collect();

    let mut results = Vec::new();
    for alt in split_alternatives(&content) {
        let combined = format!("{}{}{}", prefix, alt, suffix);
        results.extend(expand_alternation(&combined));
    }
    results
}

/// Split brace content by commas, respecting nested braces.
fn split_alternatives(content: &str) -> Vec<String> {
    let mut alternatives = Vec::new();
    let mut current = String::new();
    let mut depth = 0;

    for c in content.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                alternatives.push(current);
                current = String::new();
            }
            _ => current.push(c),
        }
    }

    alternatives.push(current);
    alternatives
}

/// Tokenize one alternative into a token program.
fn tokenize(pattern: &str) -> Vec<Tok> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Consecutive stars collapse to one
                if !matches!(toks.last(), Some(Tok::AnySpan)) {
                    toks.push(Tok::AnySpan);
                }
                i += 1;
            }
            '?' => {
                toks.push(Tok::AnyChar);
                i += 1;
            }
            '\\' if i + 1 < chars.len() => {
                toks.push(Tok::Literal(chars[i + 1]));
                i += 2;
            }
            '[' => {
                let (tok, consumed) = parse_class(&chars[i..]);
                toks.push(tok);
                i += consumed;
            }
            c => {
                toks.push(Tok::Literal(c));
                i += 1;
            }
        }
    }

    toks
}

/// Parse a character class `[...]`.
///
/// Returns the token and how many pattern chars were consumed. An unclosed
/// bracket is treated as a literal `[`.
fn parse_class(chars: &[char]) -> (Tok, usize) {
    let mut idx = 1;
    let mut negate = false;

    if idx < chars.len() && (chars[idx] == '!' || chars[idx] == '^') {
        negate = true;
        idx += 1;
    }

    // ] as first class char is literal
    let first_char = idx;
    let mut items = Vec::new();
    let mut closed = false;

    while idx < chars.len() {
        let c = chars[idx];

        if c == ']' && idx > first_char {
            idx += 1;
            closed = true;
            break;
        }

        // Range a-z (a dash before ] is literal)
        if idx + 2 < chars.len() && chars[idx + 1] == '-' && chars[idx + 2] != ']' {
            items.push(ClassItem::Range(c, chars[idx + 2]));
            idx += 3;
            continue;
        }

        items.push(ClassItem::Single(c));
        idx += 1;
    }

    if !closed {
        return (Tok::Literal('['), 1);
    }

    (Tok::Class { negate, items }, idx)
}

/// The literal string, if the whole pattern is one literal-only alternative.
fn single_literal(alternatives: &[Vec<Tok>]) -> Option<String> {
    if alternatives.len() != 1 {
        return None;
    }
    let mut out = String::new();
    for tok in &alternatives[0] {
        match tok {
            Tok::Literal(c) => out.push(*c),
            _ => return None,
        }
    }
    Some(out)
}

/// Longest literal run shared as a mandatory substring.
///
/// Only computed for single-alternative patterns; with alternation no single
/// run is mandatory.
fn must_match_literal(alternatives: &[Vec<Tok>]) -> Option<String> {
    if alternatives.len() != 1 {
        return None;
    }
    let mut best = String::new();
    let mut run = String::new();
    for tok in &alternatives[0] {
        match tok {
            Tok::Literal(c) => run.push(*c),
            _ => {
                if run.len() > best.len() {
                    best = std::mem::take(&mut run);
                } else {
                    run.clear();
                }
            }
        }
    }
    if run.len() > best.len() {
        best = run;
    }
    if best.is_empty() {
        None
    } else {
        Some(best)
    }
}

fn spent(calls: &Cell<usize>) -> bool {
    let count = calls.get() + 1;
    calls.set(count);
    count > MAX_MATCH_CALLS
}

/// Work-bounded anchored matching (both ends), with backtracking for `*`.
fn match_through(toks: &[Tok], ti: usize, chars: &[char], ci: usize, calls: &Cell<usize>) -> bool {
    if spent(calls) {
        return false;
    }

    if ti >= toks.len() {
        return ci >= chars.len();
    }

    match &toks[ti] {
        Tok::AnySpan => {
            if ti + 1 >= toks.len() {
                return true;
            }
            for skip in 0..=(chars.len() - ci) {
                if match_through(toks, ti + 1, chars, ci + skip, calls) {
                    return true;
                }
            }
            false
        }
        tok => {
            if ci >= chars.len() {
                return false;
            }
            if tok.hits(chars[ci]) {
                match_through(toks, ti + 1, chars, ci + 1, calls)
            } else {
                false
            }
        }
    }
}

/// Longest end position (in chars) the program can reach from `ci`.
///
/// This is the longest-match-native trial: the pattern is anchored at `ci`
/// and free at the far end.
fn longest_end(
    toks: &[Tok],
    ti: usize,
    chars: &[char],
    ci: usize,
    calls: &Cell<usize>,
) -> Option<usize> {
    if spent(calls) {
        return None;
    }

    if ti >= toks.len() {
        return Some(ci);
    }

    match &toks[ti] {
        Tok::AnySpan => {
            let mut best: Option<usize> = None;
            for skip in (0..=(chars.len() - ci)).rev() {
                if let Some(e) = longest_end(toks, ti + 1, chars, ci + skip, calls) {
                    best = Some(best.map_or(e, |b: usize| b.max(e)));
                }
            }
            best
        }
        tok => {
            if ci >= chars.len() || !tok.hits(chars[ci]) {
                return None;
            }
            longest_end(toks, ti + 1, chars, ci + 1, calls)
        }
    }
}

/// Minimum errors for an anchored-both-ends match, within `budget`.
///
/// An error is one character substitution, insertion, or deletion. `*`
/// absorbs freely and never costs errors.
fn min_errors(
    toks: &[Tok],
    ti: usize,
    chars: &[char],
    ci: usize,
    budget: usize,
    calls: &Cell<usize>,
) -> Option<usize> {
    if spent(calls) {
        return None;
    }

    if ti >= toks.len() {
        let rest = chars.len() - ci;
        return (rest <= budget).then_some(rest);
    }

    match &toks[ti] {
        Tok::AnySpan => {
            let mut best: Option<usize> = None;
            for skip in 0..=(chars.len() - ci) {
                if let Some(e) = min_errors(toks, ti + 1, chars, ci + skip, budget, calls) {
                    best = Some(best.map_or(e, |b: usize| b.min(e)));
                    if best == Some(0) {
                        break;
                    }
                }
            }
            best
        }
        tok => {
            let mut best: Option<usize> = None;
            let consider = |best: &mut Option<usize>, v: Option<usize>| {
                if let Some(e) = v {
                    if e <= budget {
                        *best = Some(best.map_or(e, |b: usize| b.min(e)));
                    }
                }
            };

            if ci < chars.len() && tok.hits(chars[ci]) {
                consider(&mut best, min_errors(toks, ti + 1, chars, ci + 1, budget, calls));
            }
            if best == Some(0) {
                return best;
            }
            if budget > 0 {
                // substitution
                if ci < chars.len() {
                    consider(
                        &mut best,
                        min_errors(toks, ti + 1, chars, ci + 1, budget - 1, calls)
                            .map(|e| e + 1),
                    );
                }
                // delete the pattern token
                consider(
                    &mut best,
                    min_errors(toks, ti + 1, chars, ci, budget - 1, calls).map(|e| e + 1),
                );
                // insert the input char
                if ci < chars.len() {
                    consider(
                        &mut best,
                        min_errors(toks, ti, chars, ci + 1, budget - 1, calls).map(|e| e + 1),
                    );
                }
            }
            best
        }
    }
}
