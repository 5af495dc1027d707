//! The path scanner: walks the tree one path component at a time.
//!
//! A glob word parses into a [`Complist`], one node per `/`-delimited
//! segment. Literal segments stat the joined path directly instead of
//! reading the parent directory (an optimization only; acceptance is
//! identical either way). Wildcard segments read the directory and try the
//! compiled pattern against each entry. Closure segments (`(seg/)#`,
//! `(seg/)##`, and the `**/`, `***/` sugar) re-enter themselves to match a
//! variable number of directory levels.
//!
//! Approximate matching threads a shared error budget through the
//! recursion: an intermediate directory name accepted with k errors grants
//! the rest of the path only `budget - k`. The engine always finds the
//! minimum-error acceptance first, so a looser intermediate match can never
//! mask a stricter one that would let the suffix complete.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use shglob_pattern::{CompileFlags, Pattern};

use crate::collect::Collector;
use crate::fs::{Entry, ScanFs};
use crate::GlobError;

/// Fully resolved paths longer than this abort their branch of the scan
/// (not the whole glob); sibling branches still complete.
const MAX_PATH_BYTES: usize = 4096;

/// One `/`-delimited component of a glob word.
#[derive(Clone)]
pub enum Segment {
    /// No wildcards: test the joined path directly.
    Literal(String),
    /// A compiled pattern tried against each directory entry.
    Pattern(Pattern),
    /// Matches a variable number of directory levels.
    ///
    /// `pat` of `None` accepts any segment name (the `**/` sugar).
    Closure {
        pat: Option<Pattern>,
        /// `(seg/)##`: at least one level.
        min_one: bool,
        /// `***/`: traverse symlinked directories while descending.
        follow: bool,
    },
}

/// A parsed glob word: the ordered per-segment patterns plus path-wide
/// attributes.
pub struct Complist {
    pub segments: Vec<Segment>,
    /// Word began with `/`.
    pub rooted: bool,
    /// Word ended with `/`: only directories match.
    pub dir_only: bool,
    /// Shared error budget from a `(#aN)` directive.
    pub approx: usize,
}

impl Complist {
    fn has_follow_closure(&self) -> bool {
        self.segments
            .iter()
            .any(|seg| matches!(seg, Segment::Closure { follow: true, .. }))
    }
}

/// Parse a glob word into a component list.
pub fn parse_complist(word: &str) -> Result<Complist, GlobError> {
    let (rest, rooted) = match word.strip_prefix('/') {
        Some(stripped) => (stripped.trim_start_matches('/'), true),
        None => (word, false),
    };

    let compile = |text: &str| {
        Pattern::compile(
            text,
            CompileFlags {
                reusable: true,
                ..Default::default()
            },
        )
        .map_err(|e| GlobError::BadPattern(e.to_string()))
    };

    let mut segments = Vec::new();
    let mut dir_only = false;
    let mut approx = 0usize;
    let mut rest = rest;

    while !rest.is_empty() {
        // Closure group: `(body/)#` or `(body/)##`
        if let Some((body, min_one, consumed)) = split_closure(rest) {
            let pat = compile(body)?;
            approx = approx.max(pat.approx());
            segments.push(Segment::Closure {
                pat: Some(pat),
                min_one,
                follow: false,
            });
            rest = &rest[consumed..];
            continue;
        }

        let (seg, tail, had_slash) = split_segment(rest);
        rest = tail;

        if seg.is_empty() {
            // Collapse duplicate slashes; a trailing slash means dirs only.
            if had_slash {
                continue;
            }
            dir_only = !segments.is_empty();
            break;
        }
        if had_slash && tail.is_empty() {
            dir_only = true;
        }

        if (seg == "**" || seg == "***") && had_slash {
            segments.push(Segment::Closure {
                pat: None,
                min_one: false,
                follow: seg == "***",
            });
            continue;
        }

        // A trailing `**` is plain-star, not recursive.
        let text = if seg == "**" || seg == "***" { "*" } else { seg };
        let pat = compile(text)?;
        approx = approx.max(pat.approx());
        // Once an error budget is live, even literal-looking segments must
        // go through approximate matching.
        if approx == 0 {
            if let Some(lit) = pat.literal() {
                segments.push(Segment::Literal(lit.to_string()));
                continue;
            }
        }
        segments.push(Segment::Pattern(pat));
    }

    if segments.is_empty() {
        return Err(GlobError::BadPattern(format!("empty pattern '{}'", word)));
    }

    Ok(Complist {
        segments,
        rooted,
        dir_only,
        approx,
    })
}

/// Recognize a leading closure group. Returns (body, min_one, chars consumed).
fn split_closure(rest: &str) -> Option<(&str, bool, usize)> {
    let inner = rest.strip_prefix('(')?;
    let close = inner.find(')')?;
    let body = inner[..close].strip_suffix('/')?;
    if body.is_empty() {
        return None;
    }
    let after = &inner[close + 1..];
    if !after.starts_with('#') {
        return None;
    }
    let min_one = after.starts_with("##");
    let consumed = 1 + close + 1 + if min_one { 2 } else { 1 };
    Some((body, min_one, consumed))
}

/// Split off the next segment at an unescaped `/`.
fn split_segment(rest: &str) -> (&str, &str, bool) {
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '/' => return (&rest[..i], &rest[i + 1..], true),
            _ => {}
        }
    }
    (rest, "", false)
}

/// Enumerates filesystem paths matching a [`Complist`], feeding accepted
/// leaves to the collector.
pub struct Scanner<'a> {
    fs: &'a dyn ScanFs,
    glob_dots: bool,
    shortcircuit: usize,
    visited: HashSet<PathBuf>,
}

impl<'a> Scanner<'a> {
    /// `shortcircuit` of 0 means unlimited; otherwise the scan stops as
    /// soon as that many matches have been collected. It changes how many
    /// entries are collected, never which entries are eligible.
    pub fn new(fs: &'a dyn ScanFs, glob_dots: bool, shortcircuit: usize) -> Self {
        Scanner {
            fs,
            glob_dots,
            shortcircuit,
            visited: HashSet::new(),
        }
    }

    pub fn scan(&mut self, complist: &Complist, collector: &mut Collector<'_>) {
        let (dir, prefix) = if complist.rooted {
            (PathBuf::from("/"), "/".to_string())
        } else {
            (PathBuf::from("."), String::new())
        };

        if complist.has_follow_closure() {
            self.visited.insert(self.fs.canonicalize(&dir));
        }

        self.scan_at(
            &dir,
            &prefix,
            &complist.segments,
            complist.approx,
            complist.dir_only,
            collector,
        );
    }

    fn capped(&self, collector: &Collector<'_>) -> bool {
        self.shortcircuit > 0 && collector.len() >= self.shortcircuit
    }

    fn scan_at(
        &mut self,
        dir: &Path,
        prefix: &str,
        segs: &[Segment],
        budget: usize,
        dir_only: bool,
        collector: &mut Collector<'_>,
    ) {
        if self.capped(collector) {
            return;
        }
        if prefix.len() > MAX_PATH_BYTES {
            tracing::warn!("path too long, pruning scan branch at {}", prefix);
            return;
        }
        let Some(seg) = segs.first() else {
            return;
        };
        let rest = &segs[1..];

        match seg {
            Segment::Literal(lit) => self.scan_literal(dir, prefix, lit, rest, budget, dir_only, collector),
            Segment::Pattern(pat) => self.scan_pattern(dir, prefix, pat, rest, budget, dir_only, collector),
            Segment::Closure {
                pat,
                min_one,
                follow,
            } => self.scan_closure(
                dir, prefix, pat.as_ref(), *min_one, *follow, segs, rest, budget, dir_only,
                collector,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_literal(
        &mut self,
        dir: &Path,
        prefix: &str,
        lit: &str,
        rest: &[Segment],
        budget: usize,
        dir_only: bool,
        collector: &mut Collector<'_>,
    ) {
        let full = dir.join(lit);
        let name = format!("{}{}", prefix, lit);

        if rest.is_empty() {
            match self.fs.symlink_metadata(&full) {
                Ok(meta) => {
                    if dir_only && !meta.is_dir() && !self.fs.metadata(&full).map(|m| m.is_dir()).unwrap_or(false) {
                        return;
                    }
                    collector.insert(name, Some(&meta));
                }
                Err(err) if err.is_transient() => {
                    // A dangling symlink still lstat-s fine; NotFound here
                    // really means absent, unless the readlink probe says
                    // otherwise on an exotic filesystem.
                    if self.fs.read_link_probe(&full) {
                        collector.insert(name, None);
                    }
                }
                Err(err) => {
                    tracing::warn!("stat failed for {}: {}", full.display(), err);
                }
            }
            return;
        }

        match self.fs.metadata(&full) {
            Ok(meta) if meta.is_dir() => {
                let child_prefix = format!("{}/", name);
                self.scan_at(&full, &child_prefix, rest, budget, dir_only, collector);
            }
            Ok(_) => {}
            Err(err) if err.is_transient() => {}
            Err(err) => {
                tracing::warn!("stat failed for {}: {}", full.display(), err);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_pattern(
        &mut self,
        dir: &Path,
        prefix: &str,
        pat: &Pattern,
        rest: &[Segment],
        budget: usize,
        dir_only: bool,
        collector: &mut Collector<'_>,
    ) {
        let entries = match self.read_sorted(dir) {
            Some(entries) => entries,
            None => return,
        };

        for entry in &entries {
            if self.capped(collector) {
                return;
            }
            if self.skip_dot(&entry.name, Some(pat)) {
                continue;
            }
            if let Some(lit) = pat.must_literal() {
                if !entry.name.contains(lit) {
                    continue;
                }
            }
            let Some(errors) = self.try_segment(pat, &entry.name, budget) else {
                continue;
            };

            if rest.is_empty() {
                if dir_only && !entry.is_dir {
                    continue;
                }
                collector.insert(format!("{}{}", prefix, entry.name), None);
            } else if entry.is_dir {
                let full = dir.join(&entry.name);
                let child_prefix = format!("{}{}/", prefix, entry.name);
                self.scan_at(&full, &child_prefix, rest, budget - errors, dir_only, collector);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_closure(
        &mut self,
        dir: &Path,
        prefix: &str,
        pat: Option<&Pattern>,
        min_one: bool,
        follow: bool,
        segs: &[Segment],
        rest: &[Segment],
        budget: usize,
        dir_only: bool,
        collector: &mut Collector<'_>,
    ) {
        // Zero levels consumed: the rest of the pattern matches right here.
        if !min_one {
            if rest.is_empty() {
                // A trailing closure matches the directory itself.
                let name = prefix.trim_end_matches('/').to_string();
                if !name.is_empty() {
                    collector.insert(name, None);
                }
            } else {
                self.scan_at(dir, prefix, rest, budget, dir_only, collector);
            }
        }

        let entries = match self.read_sorted(dir) {
            Some(entries) => entries,
            None => return,
        };

        // After one level the one-or-more obligation is met.
        let relaxed;
        let descend_segs: &[Segment] = if min_one {
            let mut v = segs.to_vec();
            if let Some(Segment::Closure { min_one, .. }) = v.first_mut() {
                *min_one = false;
            }
            relaxed = v;
            &relaxed
        } else {
            segs
        };

        for entry in &entries {
            if self.capped(collector) {
                return;
            }
            if !entry.is_dir {
                continue;
            }
            if entry.is_symlink && !follow {
                continue;
            }
            if self.skip_dot(&entry.name, pat) {
                continue;
            }
            let errors = match pat {
                Some(p) => match self.try_segment(p, &entry.name, budget) {
                    Some(errors) => errors,
                    None => continue,
                },
                None => 0,
            };

            let full = dir.join(&entry.name);
            if follow && entry.is_symlink {
                let canonical = self.fs.canonicalize(&full);
                if !self.visited.insert(canonical) {
                    tracing::debug!("symlink cycle at {}, skipping", full.display());
                    continue;
                }
            }

            let child_prefix = format!("{}{}/", prefix, entry.name);
            self.scan_at(
                &full,
                &child_prefix,
                descend_segs,
                budget - errors,
                dir_only,
                collector,
            );
        }
    }

    /// Directory listing in deterministic (byte-sorted) order; `None` when
    /// the directory went away or is unreadable.
    fn read_sorted(&self, dir: &Path) -> Option<Vec<Entry>> {
        match self.fs.read_dir(dir) {
            Ok(mut entries) => {
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                Some(entries)
            }
            Err(err) if err.is_transient() => None,
            Err(err) => {
                tracing::warn!("cannot read {}: {}", dir.display(), err);
                None
            }
        }
    }

    /// Wildcards refuse a leading dot unless the glob-dots option is on or
    /// the pattern spells the dot out.
    fn skip_dot(&self, name: &str, pat: Option<&Pattern>) -> bool {
        name.starts_with('.')
            && !self.glob_dots
            && !pat.map(Pattern::leading_literal_dot).unwrap_or(false)
    }

    /// Match one segment name, exactly or within the error budget. Returns
    /// the minimum errors consumed.
    fn try_segment(&self, pat: &Pattern, name: &str, budget: usize) -> Option<usize> {
        if budget == 0 {
            return pat.matches(name).then_some(0);
        }
        pat.try_match_errors(name, budget)
    }
}
