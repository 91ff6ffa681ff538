//! Minimal filesystem capability behind the local audit log.
//!
//! Three variants: `local` (real disk with fsync discipline), `memory`
//! (in-process map, the CLI's `virtual`), and `nop` (accepts and discards).
//! Keeping the audit log behind this seam lets its durability protocol be
//! tested without touching disk.

pub mod local;
pub mod memory;
pub mod nop;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use local::LocalFilesystem;
pub use memory::MemoryFilesystem;
pub use nop::NopFilesystem;

/// A writable file handle. Contents are durable once `sync` returns.
pub trait FsFile: io::Write + Send {
    fn sync(&mut self) -> io::Result<()>;
}

/// Guard for a held lock file; released on drop.
pub trait FsLock: Send {}

/// Filesystem capability set used by the local audit log.
pub trait Filesystem: Send + Sync {
    fn mkdir_all(&self, path: &Path) -> io::Result<()>;

    fn create(&self, path: &Path) -> io::Result<Box<dyn FsFile>>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Acquires the lock file at `path`, creating it if needed.
    fn lock(&self, path: &Path) -> io::Result<Box<dyn FsLock>>;

    /// Lists files (not directories) under `root`, recursively.
    fn walk(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Which filesystem variant to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesystemKind {
    Local,
    Virtual,
    Nop,
}

impl std::str::FromStr for FilesystemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(FilesystemKind::Local),
            "virtual" => Ok(FilesystemKind::Virtual),
            "nop" => Ok(FilesystemKind::Nop),
            other => Err(format!("unexpected filesystem type {other:?}")),
        }
    }
}

impl FilesystemKind {
    pub fn build(self) -> Arc<dyn Filesystem> {
        match self {
            FilesystemKind::Local => Arc::new(LocalFilesystem),
            FilesystemKind::Virtual => Arc::new(MemoryFilesystem::new()),
            FilesystemKind::Nop => Arc::new(NopFilesystem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_known_values() {
        assert_eq!("local".parse::<FilesystemKind>().unwrap(), FilesystemKind::Local);
        assert_eq!("virtual".parse::<FilesystemKind>().unwrap(), FilesystemKind::Virtual);
        assert_eq!("nop".parse::<FilesystemKind>().unwrap(), FilesystemKind::Nop);
        assert!("s3".parse::<FilesystemKind>().is_err());
    }
}
