//! Filesystem capability consumed by the scanner and collector.
//!
//! The engine never touches `std::fs` directly; everything goes through the
//! [`ScanFs`] trait so consumers can adapt their own filesystem layer (a VFS,
//! a test double, a sandbox). All operations are synchronous and take full
//! paths; the engine never changes the process working directory, so there
//! is no restore obligation on any exit path.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Errors from filesystem operations within a scan.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not a directory: {0}")]
    NotDir(String),
    #[error("interrupted: {0}")]
    Interrupted(String),
    #[error("path too long: {0}")]
    PathTooLong(String),
    #[error("io error: {0}")]
    Io(String),
}

impl FsError {
    pub(crate) fn from_io(err: &io::Error, path: &Path) -> Self {
        let p = path.display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(p),
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied(p),
            io::ErrorKind::NotADirectory => FsError::NotDir(p),
            io::ErrorKind::Interrupted => FsError::Interrupted(p),
            _ => FsError::Io(format!("{}: {}", p, err)),
        }
    }

    /// True for the error kinds a scan silently skips (a racing unlink, a
    /// signal, a file where a directory was expected).
    pub(crate) fn is_transient(&self) -> bool {
        matches!(
            self,
            FsError::NotFound(_) | FsError::Interrupted(_) | FsError::NotDir(_)
        )
    }
}

/// Kind of filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    Socket,
    Fifo,
    BlockDevice,
    CharDevice,
    Unknown,
}

/// Cached stat fields for one filesystem object.
///
/// Every field a qualifier or sort key can read is captured here, so an
/// entry is stat-ed at most twice (once direct, once following the symlink)
/// no matter how many predicates inspect it.
#[derive(Debug, Clone, Default)]
pub struct FileMeta {
    pub kind: Option<FileKind>,
    /// Full mode word including permission and special bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub nlink: u64,
    pub dev: u64,
    pub atime: i64,
    pub atime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub ctime: i64,
    pub ctime_nsec: i64,
}

impl FileMeta {
    pub fn kind(&self) -> FileKind {
        self.kind.unwrap_or(FileKind::Unknown)
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    #[cfg(unix)]
    fn from_std(meta: &fs::Metadata) -> Self {
        use std::os::unix::fs::FileTypeExt;
        use std::os::unix::fs::MetadataExt;

        let ft = meta.file_type();
        let kind = if ft.is_dir() {
            FileKind::Directory
        } else if ft.is_symlink() {
            FileKind::Symlink
        } else if ft.is_socket() {
            FileKind::Socket
        } else if ft.is_fifo() {
            FileKind::Fifo
        } else if ft.is_block_device() {
            FileKind::BlockDevice
        } else if ft.is_char_device() {
            FileKind::CharDevice
        } else if ft.is_file() {
            FileKind::Regular
        } else {
            FileKind::Unknown
        };

        FileMeta {
            kind: Some(kind),
            mode: meta.mode(),
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.size(),
            nlink: meta.nlink(),
            dev: meta.dev(),
            atime: meta.atime(),
            atime_nsec: meta.atime_nsec(),
            mtime: meta.mtime(),
            mtime_nsec: meta.mtime_nsec(),
            ctime: meta.ctime(),
            ctime_nsec: meta.ctime_nsec(),
        }
    }
}

/// A single entry returned by [`ScanFs::read_dir`].
#[derive(Debug, Clone)]
pub struct Entry {
    /// The entry name (file or directory name, not full path).
    pub name: String,
    /// True if this entry is a directory (following symlinks).
    pub is_dir: bool,
    /// True if this entry is a symbolic link.
    pub is_symlink: bool,
}

/// Minimal read-only filesystem abstraction for scanning.
///
/// Implement this trait to adapt your project's filesystem layer to the
/// glob engine. [`RealFs`] is the `std::fs`-backed implementation.
pub trait ScanFs {
    /// List the entries in a directory.
    fn read_dir(&self, path: &Path) -> Result<Vec<Entry>, FsError>;

    /// Stat, following symlinks.
    fn metadata(&self, path: &Path) -> Result<FileMeta, FsError>;

    /// Stat the object itself, never following a final symlink.
    fn symlink_metadata(&self, path: &Path) -> Result<FileMeta, FsError>;

    /// Probe whether `path` is a symlink at all.
    ///
    /// Used only to distinguish a dangling symlink from "does not exist"
    /// when no stat structure was otherwise requested.
    fn read_link_probe(&self, path: &Path) -> bool;

    /// Return the canonical (resolved) path, following symlinks.
    ///
    /// Used for cycle detection when a closure component follows symlinked
    /// directories. The default returns the path unchanged, which disables
    /// detection; real filesystems should resolve.
    fn canonicalize(&self, path: &Path) -> std::path::PathBuf {
        path.to_path_buf()
    }
}

/// The `std::fs`-backed filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl ScanFs for RealFs {
    fn read_dir(&self, path: &Path) -> Result<Vec<Entry>, FsError> {
        let iter = fs::read_dir(path).map_err(|e| FsError::from_io(&e, path))?;
        let mut entries = Vec::new();
        for dent in iter {
            let dent = dent.map_err(|e| FsError::from_io(&e, path))?;
            let name = match dent.file_name().into_string() {
                Ok(name) => name,
                // Skip names that are not valid UTF-8 rather than failing
                // the whole directory.
                Err(_) => continue,
            };
            let ft = dent.file_type().map_err(|e| FsError::from_io(&e, path))?;
            let is_symlink = ft.is_symlink();
            let is_dir = if is_symlink {
                fs::metadata(dent.path()).map(|m| m.is_dir()).unwrap_or(false)
            } else {
                ft.is_dir()
            };
            entries.push(Entry {
                name,
                is_dir,
                is_symlink,
            });
        }
        Ok(entries)
    }

    fn metadata(&self, path: &Path) -> Result<FileMeta, FsError> {
        fs::metadata(path)
            .map(|m| FileMeta::from_std(&m))
            .map_err(|e| FsError::from_io(&e, path))
    }

    fn symlink_metadata(&self, path: &Path) -> Result<FileMeta, FsError> {
        fs::symlink_metadata(path)
            .map(|m| FileMeta::from_std(&m))
            .map_err(|e| FsError::from_io(&e, path))
    }

    fn read_link_probe(&self, path: &Path) -> bool {
        fs::read_link(path).is_ok()
    }

    fn canonicalize(&self, path: &Path) -> std::path::PathBuf {
        fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}
