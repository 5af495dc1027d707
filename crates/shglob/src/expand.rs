//! The caller-facing expansion surface.
//!
//! [`expand_glob`] takes a word list and a position, expands the glob word
//! there, and splices the results in its place (the shape word expansion
//! wants). [`glob_files`] is the word-free core underneath it.
//!
//! Every call builds a fresh scan context from the caller's options plus
//! the word's own trailing qualifiers, so a nested invocation (an `e`
//! qualifier script that triggers another glob) cannot corrupt the outer
//! scan's state.

use std::time::SystemTime;

use shglob_pattern::contains_glob;

use crate::collect::Collector;
use crate::qualifier::{parse_qualifiers, Predicate};
use crate::scan::{parse_complist, Scanner};
use crate::script::ScriptEval;
use crate::sort::{sort_entries, RangeSpec, SortKey, SortKeyKind};
use crate::fs::ScanFs;
use crate::GlobError;

/// What happens when a glob produces zero matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoMatchPolicy {
    /// The word silently vanishes from the list (null-glob).
    Vanish,
    /// The original glob text stays as an ordinary word.
    #[default]
    Literal,
    /// The whole expansion fails with [`GlobError::NoMatch`].
    Error,
}

/// Options in effect for one glob expansion.
///
/// Trailing qualifiers on the word update a per-call copy; the caller's
/// value is never mutated.
#[derive(Debug, Clone, Default)]
pub struct GlobOptions {
    pub no_match: NoMatchPolicy,
    /// A pattern that fails to compile is a hard error instead of falling
    /// back to the literal word.
    pub bad_pattern_is_error: bool,
    /// `N` qualifier: zero matches vanish regardless of `no_match`.
    pub null_glob: bool,
    /// `M` qualifier: append `/` to directory matches.
    pub mark_dirs: bool,
    /// `T` qualifier: append the full type-marker set.
    pub list_types: bool,
    /// `D` qualifier: let wildcards match a leading dot.
    pub glob_dots: bool,
    /// `n` qualifier: numeric-aware name and eval-key comparison.
    pub numeric_sort: bool,
    /// `oN` qualifier: no sort at all, raw scan order.
    pub unsorted: bool,
    /// `o`/`O` sort keys; empty means the default ascending name sort.
    pub sort_keys: Vec<SortKey>,
    /// `Y<n>` qualifier: stop after n matches (0 = unlimited).
    pub shortcircuit: usize,
    /// `[first,last]` index range.
    pub range: Option<RangeSpec>,
    /// `P` qualifier: words prepended before each match.
    pub prepend: Vec<String>,
    /// `^P` qualifier: words appended after each match.
    pub append: Vec<String>,
}

/// Expand a glob word and return the matching paths.
///
/// The word may carry trailing `(...)` qualifier groups. Zero matches is an
/// empty vector here; no-match policy belongs to [`expand_glob`].
pub fn glob_files(
    word: &str,
    fs: &dyn ScanFs,
    eval: Option<&dyn ScriptEval>,
    opts: &GlobOptions,
) -> Result<Vec<String>, GlobError> {
    glob_word(word, fs, eval, opts).map(|(matches, _)| matches)
}

/// Expand the glob word at `position`, splicing the results (and any
/// `P`-qualifier prepend/append words) into the list in its place.
pub fn expand_glob(
    words: &mut Vec<String>,
    position: usize,
    fs: &dyn ScanFs,
    eval: Option<&dyn ScriptEval>,
    opts: &GlobOptions,
) -> Result<(), GlobError> {
    let Some(word) = words.get(position).cloned() else {
        return Ok(());
    };

    let (matches, eff) = glob_word(&word, fs, eval, opts)?;

    if matches.is_empty() {
        if eff.null_glob || opts.no_match == NoMatchPolicy::Vanish {
            words.remove(position);
            return Ok(());
        }
        match opts.no_match {
            NoMatchPolicy::Literal => return Ok(()),
            _ => {
                tracing::debug!("no matches found: {}", word);
                return Err(GlobError::NoMatch(word));
            }
        }
    }

    let mut spliced = Vec::with_capacity(matches.len());
    for m in matches {
        spliced.extend(eff.prepend.iter().cloned());
        spliced.push(m);
        spliced.extend(eff.append.iter().cloned());
    }
    words.splice(position..=position, spliced);
    Ok(())
}

/// The core: parse qualifiers, build the component list, scan, sort,
/// range-select. Returns the matches plus the effective per-call options.
fn glob_word(
    word: &str,
    fs: &dyn ScanFs,
    eval: Option<&dyn ScriptEval>,
    opts: &GlobOptions,
) -> Result<(Vec<String>, GlobOptions), GlobError> {
    let mut eff = opts.clone();
    let (base, groups) = split_qualifiers(word);

    // Chained qualifier groups combine by cross-distribution: every
    // alternative of the first with every alternative of the second.
    let mut pred: Option<Predicate> = None;
    for group in &groups {
        let parsed = parse_qualifiers(group, &mut eff)?;
        pred = match (pred, parsed) {
            (None, p) => p,
            (p, None) => p,
            (Some(a), Some(b)) => Some(Predicate::merge(a, b)),
        };
    }

    let complist = match parse_complist(&base) {
        Ok(complist) => complist,
        Err(err) => {
            if eff.bad_pattern_is_error {
                return Err(err);
            }
            tracing::debug!("bad pattern, keeping literal word: {}", err);
            return Ok((vec![word.to_string()], eff));
        }
    };

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let mut collector = Collector::new(fs, eval, &eff, pred.as_ref(), now);
    let mut scanner = Scanner::new(fs, eff.glob_dots, eff.shortcircuit);
    scanner.scan(&complist, &mut collector);
    let mut entries = collector.into_entries();

    // A short-circuit with no sort requested keeps raw scan order: the cap
    // asks for the first matches found, and sorting would change which
    // matches those appear to be.
    let unsorted = eff.unsorted || (eff.shortcircuit > 0 && eff.sort_keys.is_empty());
    if !unsorted {
        let default_keys;
        let keys: &[SortKey] = if eff.sort_keys.is_empty() {
            default_keys = [SortKey::ascending(SortKeyKind::Name)];
            &default_keys
        } else {
            &eff.sort_keys
        };
        sort_entries(&mut entries, keys, eff.numeric_sort);
    }

    if let Some(range) = eff.range {
        let (first, last) = range.resolve(entries.len());
        entries.truncate(last);
        entries.drain(..first);
    }

    let matches = entries.iter().map(|e| e.display()).collect();
    Ok((matches, eff))
}

/// Peel trailing `(...)` qualifier groups off a word, leftmost group first
/// in the returned list.
fn split_qualifiers(word: &str) -> (String, Vec<String>) {
    let mut base = word;
    let mut groups = Vec::new();

    while base.ends_with(')') && !base.ends_with("\\)") {
        let Some(open) = matching_open(base) else {
            break;
        };
        groups.push(base[open + 1..base.len() - 1].to_string());
        base = &base[..open];
    }

    groups.reverse();
    (base.to_string(), groups)
}

/// Byte index of the `(` matching a final `)`.
fn matching_open(s: &str) -> Option<usize> {
    let mut depth = 0;
    for (i, c) in s.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Does this word need glob expansion at all?
///
/// True when it carries metacharacters, a qualifier group, or a closure.
pub fn is_glob_word(word: &str) -> bool {
    contains_glob(word) || word.ends_with(')') || word.contains("(#") || word.contains(")#")
}
