//! Match collection: accepting candidates into the growable match buffer.
//!
//! The collector performs exactly the stats the active qualifiers, sort keys
//! and type markers require, caches both stat sets on the entry so nothing
//! downstream re-stats, and appends in scan order. Sorting and range
//! selection happen later, on the full buffer.

use std::path::Path;

use crate::expand::GlobOptions;
use crate::fs::{FileKind, FileMeta, ScanFs};
use crate::qualifier::{Candidate, Predicate, QualEnv};
use crate::script::ScriptEval;
use crate::sort::SortKeyKind;

/// One accepted filesystem path plus its cached stat fields.
#[derive(Debug, Clone, Default)]
pub struct MatchEntry {
    /// The produced word, without any type marker.
    pub name: String,
    /// Stat of the object itself (lstat).
    pub meta: Option<FileMeta>,
    /// Stat following a final symlink, populated only when a qualifier or
    /// sort key that follows requested it. `None` also covers dangling
    /// links.
    pub follow_meta: Option<FileMeta>,
    /// Captured output of each script-evaluated sort key, in key order.
    pub eval_keys: Vec<String>,
    /// Type-marker suffix under mark-dirs / list-types.
    pub marker: Option<char>,
}

impl MatchEntry {
    /// An entry with a name and nothing else; stat fields unset.
    pub fn bare(name: String) -> Self {
        MatchEntry {
            name,
            ..Default::default()
        }
    }

    /// The final word, marker included.
    pub fn display(&self) -> String {
        match self.marker {
            Some(marker) => format!("{}{}", self.name, marker),
            None => self.name.clone(),
        }
    }
}

/// Collects accepted candidates for one glob invocation.
pub struct Collector<'a> {
    fs: &'a dyn ScanFs,
    eval: Option<&'a dyn ScriptEval>,
    opts: &'a GlobOptions,
    pred: Option<&'a Predicate>,
    now: i64,
    needs_stat: bool,
    needs_follow: bool,
    eval_codes: Vec<&'a str>,
    entries: Vec<MatchEntry>,
}

impl<'a> Collector<'a> {
    pub fn new(
        fs: &'a dyn ScanFs,
        eval: Option<&'a dyn ScriptEval>,
        opts: &'a GlobOptions,
        pred: Option<&'a Predicate>,
        now: i64,
    ) -> Self {
        let keys_need_stat = opts.sort_keys.iter().any(|k| {
            matches!(
                k.kind,
                SortKeyKind::Size
                    | SortKeyKind::Links
                    | SortKeyKind::Atime
                    | SortKeyKind::Mtime
                    | SortKeyKind::Ctime
            )
        });
        let needs_stat = pred.is_some()
            || opts.mark_dirs
            || opts.list_types
            || keys_need_stat;
        let needs_follow = pred.map(Predicate::needs_follow).unwrap_or(false)
            || opts.sort_keys.iter().any(|k| k.follow)
            || opts.mark_dirs
            || opts.list_types;
        let eval_codes = opts
            .sort_keys
            .iter()
            .filter_map(|k| match &k.kind {
                SortKeyKind::Eval(code) => Some(code.as_str()),
                _ => None,
            })
            .collect();

        Collector {
            fs,
            eval,
            opts,
            pred,
            now,
            needs_stat,
            needs_follow,
            eval_codes,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<MatchEntry> {
        self.entries
    }

    /// Accept one candidate path into the buffer, predicate permitting.
    ///
    /// `known` carries the lstat result when the scanner already has one,
    /// saving the duplicate syscall. A candidate that vanished between the
    /// directory read and the stat is silently skipped.
    pub fn insert(&mut self, name: String, known: Option<&FileMeta>) {
        let path_owned = std::path::PathBuf::from(&name);
        let path: &Path = &path_owned;

        let meta = if self.needs_stat {
            match known {
                Some(m) => Some(m.clone()),
                None => match self.fs.symlink_metadata(path) {
                    Ok(m) => Some(m),
                    Err(err) if err.is_transient() => {
                        tracing::debug!("skipping vanished entry {}: {}", name, err);
                        return;
                    }
                    Err(err) => {
                        tracing::warn!("stat failed for {}: {}", name, err);
                        return;
                    }
                },
            }
        } else {
            known.cloned()
        };

        let follow_meta = if self.needs_follow {
            match meta.as_ref().map(FileMeta::kind) {
                Some(FileKind::Symlink) => self.fs.metadata(path).ok(),
                _ => meta.clone(),
            }
        } else {
            None
        };

        if let Some(pred) = self.pred {
            let Some(meta_ref) = meta.as_ref() else {
                return;
            };
            let env = QualEnv {
                fs: self.fs,
                eval: self.eval,
                now: self.now,
            };
            let cand = Candidate {
                path,
                meta: meta_ref,
                target: follow_meta.as_ref(),
            };
            if !pred.accepts(&cand, &env) {
                return;
            }
        }

        let eval_keys = self
            .eval_codes
            .iter()
            .map(|code| match self.eval {
                Some(eval) => eval
                    .eval_capture(code, &name)
                    .unwrap_or_default(),
                None => String::new(),
            })
            .collect();

        let marker = self.marker_for(meta.as_ref(), follow_meta.as_ref());

        self.entries.push(MatchEntry {
            name,
            meta,
            follow_meta,
            eval_keys,
            marker,
        });
    }

    /// Type-marker suffix: `/` dir, `*` executable, `@` symlink, `=` socket,
    /// `|` fifo, `%` device, nothing for a plain file.
    fn marker_for(&self, meta: Option<&FileMeta>, follow: Option<&FileMeta>) -> Option<char> {
        if !self.opts.mark_dirs && !self.opts.list_types {
            return None;
        }

        // Markers describe the pointed-to object, except a dangling or
        // unresolved symlink keeps its own '@'.
        let effective = follow.or(meta)?;
        let kind = effective.kind();

        if self.opts.mark_dirs && !self.opts.list_types {
            return (kind == FileKind::Directory).then_some('/');
        }

        match kind {
            FileKind::Directory => Some('/'),
            FileKind::Symlink => Some('@'),
            FileKind::Socket => Some('='),
            FileKind::Fifo => Some('|'),
            FileKind::BlockDevice | FileKind::CharDevice => Some('%'),
            FileKind::Regular if effective.mode & 0o111 != 0 => Some('*'),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::GlobOptions;
    use crate::qualifier::parse_qualifiers;
    use crate::testfs::MemoryFs;

    fn options() -> GlobOptions {
        GlobOptions::default()
    }

    #[test]
    fn bare_insert_without_stats() {
        let fs = MemoryFs::new();
        let opts = options();
        let mut collector = Collector::new(&fs, None, &opts, None, 0);
        collector.insert("a.txt".into(), None);
        collector.insert("b.txt".into(), None);

        let entries = collector.into_entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].meta.is_none());
        assert!(entries[0].marker.is_none());
    }

    #[test]
    fn predicate_filters_entries() {
        let mut fs = MemoryFs::new();
        fs.add_file("/dir/file.txt", 10);
        fs.add_dir("/dir/sub");

        let mut opts = options();
        let pred = parse_qualifiers(".", &mut opts).unwrap().unwrap();
        let mut collector = Collector::new(&fs, None, &opts, Some(&pred), 0);
        collector.insert("/dir/file.txt".into(), None);
        collector.insert("/dir/sub".into(), None);

        let entries = collector.into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "/dir/file.txt");
    }

    #[test]
    fn vanished_entry_skipped() {
        let fs = MemoryFs::new();
        let mut opts = options();
        let pred = parse_qualifiers(".", &mut opts).unwrap().unwrap();
        let mut collector = Collector::new(&fs, None, &opts, Some(&pred), 0);
        collector.insert("/nope".into(), None);
        assert!(collector.is_empty());
    }

    #[test]
    fn mark_dirs_markers() {
        let mut fs = MemoryFs::new();
        fs.add_file("/f", 1);
        fs.add_dir("/d");

        let mut opts = options();
        opts.mark_dirs = true;
        let mut collector = Collector::new(&fs, None, &opts, None, 0);
        collector.insert("/f".into(), None);
        collector.insert("/d".into(), None);

        let entries = collector.into_entries();
        assert_eq!(entries[0].display(), "/f");
        assert_eq!(entries[1].display(), "/d/");
    }

    #[test]
    fn list_types_markers() {
        let mut fs = MemoryFs::new();
        fs.add_file("/plain", 1);
        fs.add_file_with("/exec", |m| {
            m.mode = 0o755;
            m.size = 1;
        });
        fs.add_dir("/d");
        fs.add_fifo("/pipe");

        let mut opts = options();
        opts.list_types = true;
        let mut collector = Collector::new(&fs, None, &opts, None, 0);
        for name in ["/plain", "/exec", "/d", "/pipe"] {
            collector.insert(name.into(), None);
        }

        let shown: Vec<String> = collector
            .into_entries()
            .iter()
            .map(MatchEntry::display)
            .collect();
        assert_eq!(shown, vec!["/plain", "/exec*", "/d/", "/pipe|"]);
    }

    #[test]
    fn follow_stat_cached_for_symlink() {
        let mut fs = MemoryFs::new();
        fs.add_dir("/real");
        fs.add_symlink("/link", "/real");

        let mut opts = options();
        let pred = parse_qualifiers("-/", &mut opts).unwrap().unwrap();
        let mut collector = Collector::new(&fs, None, &opts, Some(&pred), 0);
        collector.insert("/link".into(), None);

        let entries = collector.into_entries();
        assert_eq!(entries.len(), 1);
        // Both stat sets cached: lstat says symlink, follow says directory.
        assert_eq!(
            entries[0].meta.as_ref().map(FileMeta::kind),
            Some(FileKind::Symlink)
        );
        assert_eq!(
            entries[0].follow_meta.as_ref().map(FileMeta::kind),
            Some(FileKind::Directory)
        );
    }

    #[test]
    fn dangling_symlink_follow_predicate_rejects() {
        let mut fs = MemoryFs::new();
        fs.add_symlink("/dangling", "/nowhere");

        let mut opts = options();
        let pred = parse_qualifiers("-.", &mut opts).unwrap().unwrap();
        let mut collector = Collector::new(&fs, None, &opts, Some(&pred), 0);
        collector.insert("/dangling".into(), None);
        assert!(collector.is_empty());
    }
}
