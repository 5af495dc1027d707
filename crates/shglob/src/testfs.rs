//! In-memory filesystem for unit tests.
//!
//! Supports files, directories, and symbolic links, with full control over
//! the stat fields a qualifier can observe. Symlinks resolve through path
//! prefixes the way a real filesystem resolves intermediate components.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::fs::{Entry, FileKind, FileMeta, FsError, ScanFs};

pub struct MemoryFs {
    /// lstat view of every object, keyed by unresolved path.
    metas: HashMap<PathBuf, FileMeta>,
    /// Symlink path → target path.
    symlinks: HashMap<PathBuf, PathBuf>,
}

fn dir_meta() -> FileMeta {
    FileMeta {
        kind: Some(FileKind::Directory),
        mode: 0o755,
        nlink: 2,
        ..Default::default()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut metas = HashMap::new();
        metas.insert(PathBuf::from("/"), dir_meta());
        MemoryFs {
            metas,
            symlinks: HashMap::new(),
        }
    }

    pub fn add_dir(&mut self, path: &str) {
        self.ensure_dirs(Path::new(path));
    }

    pub fn add_file(&mut self, path: &str, size: u64) {
        self.add_file_with(path, |m| m.size = size);
    }

    /// Add a regular file and adjust its stat fields.
    pub fn add_file_with(&mut self, path: &str, adjust: impl FnOnce(&mut FileMeta)) {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent() {
            self.ensure_dirs(parent);
        }
        let mut meta = FileMeta {
            kind: Some(FileKind::Regular),
            mode: 0o644,
            nlink: 1,
            ..Default::default()
        };
        adjust(&mut meta);
        self.metas.insert(path, meta);
    }

    pub fn add_fifo(&mut self, path: &str) {
        self.add_file_with(path, |m| m.kind = Some(FileKind::Fifo));
    }

    /// Add a symlink pointing at `target` (which may or may not exist).
    pub fn add_symlink(&mut self, link: &str, target: &str) {
        let link = PathBuf::from(link);
        if let Some(parent) = link.parent() {
            self.ensure_dirs(parent);
        }
        self.metas.insert(
            link.clone(),
            FileMeta {
                kind: Some(FileKind::Symlink),
                mode: 0o777,
                nlink: 1,
                ..Default::default()
            },
        );
        self.symlinks.insert(link, PathBuf::from(target));
    }

    /// Alias making directory-symlink intent explicit at the call site.
    pub fn add_symlink_dir(&mut self, link: &str, target: &str) {
        self.add_symlink(link, target);
    }

    fn ensure_dirs(&mut self, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            self.metas.entry(current.clone()).or_insert_with(dir_meta);
        }
    }

    /// Resolve symlinks in every prefix component, but not a final symlink.
    fn resolve_parents(&self, path: &Path) -> PathBuf {
        let mut resolved = PathBuf::new();
        let components: Vec<_> = path.components().collect();
        for (i, component) in components.iter().enumerate() {
            resolved.push(component);
            if i + 1 == components.len() {
                break;
            }
            let mut hops = 0;
            while let Some(target) = self.symlinks.get(&resolved) {
                resolved = target.clone();
                hops += 1;
                if hops > 8 {
                    break;
                }
            }
        }
        resolved
    }

    /// Resolve symlinks in every component, the final one included.
    fn resolve_full(&self, path: &Path) -> PathBuf {
        let mut resolved = self.resolve_parents(path);
        let mut hops = 0;
        while let Some(target) = self.symlinks.get(&resolved) {
            resolved = target.clone();
            hops += 1;
            if hops > 8 {
                break;
            }
        }
        resolved
    }
}

impl ScanFs for MemoryFs {
    fn read_dir(&self, path: &Path) -> Result<Vec<Entry>, FsError> {
        let dir = self.resolve_full(path);
        match self.metas.get(&dir) {
            Some(meta) if meta.is_dir() => {}
            Some(_) => return Err(FsError::NotDir(path.display().to_string())),
            None => return Err(FsError::NotFound(path.display().to_string())),
        }

        let mut entries = Vec::new();
        for child in self.metas.keys() {
            if child.parent() == Some(dir.as_path()) {
                let Some(name) = child.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let is_symlink = self.symlinks.contains_key(child);
                let is_dir = self
                    .metas
                    .get(&self.resolve_full(child))
                    .map(FileMeta::is_dir)
                    .unwrap_or(false);
                entries.push(Entry {
                    name: name.to_string(),
                    is_dir,
                    is_symlink,
                });
            }
        }
        Ok(entries)
    }

    fn metadata(&self, path: &Path) -> Result<FileMeta, FsError> {
        self.metas
            .get(&self.resolve_full(path))
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.display().to_string()))
    }

    fn symlink_metadata(&self, path: &Path) -> Result<FileMeta, FsError> {
        self.metas
            .get(&self.resolve_parents(path))
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.display().to_string()))
    }

    fn read_link_probe(&self, path: &Path) -> bool {
        self.symlinks.contains_key(&self.resolve_parents(path))
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        self.resolve_full(path)
    }
}
