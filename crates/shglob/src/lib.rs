//! shglob: Shell filename generation and pattern retrieval.
//!
//! Provides:
//! - **expand_glob / glob_files**: recursive path globbing with `**`,
//!   closure components (`(dir/)#`), and trailing `(...)` qualifiers
//! - **Qualifiers**: file-type, permission, ownership, size, timestamp and
//!   script predicates, plus sort keys, index ranges, and scan flags
//! - **expand_braces**: `{a,b,c}`, `{1..10..2}`, `{a..z}` expansion,
//!   purely textual
//! - **extract_match**: the anchored/substring matching rules behind
//!   `${var#pat}`, `${var%pat}` and `${var//pat/repl}`
//!
//! The engine is generic over [`ScanFs`], a minimal read-only filesystem
//! trait, and consumes single-segment pattern matching from the
//! `shglob-pattern` crate as an opaque capability. Everything runs
//! synchronously; a fresh scan context is built per call, so a qualifier
//! script that re-enters the engine cannot corrupt an outer scan.

pub mod brace;
pub mod collect;
pub mod expand;
pub mod fs;
pub mod qualifier;
pub mod scan;
pub mod script;
pub mod sort;
pub mod subst;

#[cfg(test)]
pub(crate) mod testfs;

use thiserror::Error;

pub use shglob_pattern::{contains_glob, CompileFlags, Pattern, PatternError};

pub use brace::{expand_braces, expand_braces_into, expand_braces_with};
pub use collect::MatchEntry;
pub use expand::{expand_glob, glob_files, is_glob_word, GlobOptions, NoMatchPolicy};
pub use fs::{Entry, FileKind, FileMeta, FsError, RealFs, ScanFs};
pub use qualifier::{parse_qualifiers, Candidate, Predicate, QualEnv, QualTest};
pub use scan::{parse_complist, Complist, Scanner, Segment};
pub use script::{ScriptEval, ShellEval};
pub use sort::{RangeSpec, SortKey, SortKeyKind};
pub use subst::{extract_match, extract_match_all, MatchFlags, Repldata};

/// Errors from glob expansion.
#[derive(Debug, Error)]
pub enum GlobError {
    /// Malformed qualifier syntax, bad numeric/mode argument, unresolvable
    /// user/group name, or an unterminated delimiter. Aborts the whole
    /// expansion with no partial results.
    #[error("bad glob qualifier: {0}")]
    Parse(String),
    /// The pattern text failed to compile.
    #[error("bad pattern: {0}")]
    BadPattern(String),
    /// Zero matches under the strict no-match policy.
    #[error("no matches found: {0}")]
    NoMatch(String),
    /// A directory handle went away mid-scan and relative operations would
    /// be meaningless. Unreachable with path-joining filesystems; kept for
    /// handle-based [`ScanFs`] implementations.
    #[error("working directory lost: {0}")]
    DirectoryLost(String),
    #[error(transparent)]
    Fs(#[from] FsError),
}
