//! Filesystem variant that accepts and discards everything.

use std::io;
use std::path::{Path, PathBuf};

use super::{Filesystem, FsFile, FsLock};

/// A [`Filesystem`] whose writes go nowhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopFilesystem;

struct NopFile;

impl io::Write for NopFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FsFile for NopFile {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct NopLock;

impl FsLock for NopLock {}

impl Filesystem for NopFilesystem {
    fn mkdir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn create(&self, _path: &Path) -> io::Result<Box<dyn FsFile>> {
        Ok(Box::new(NopFile))
    }

    fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
        Ok(())
    }

    fn exists(&self, _path: &Path) -> bool {
        false
    }

    fn lock(&self, _path: &Path) -> io::Result<Box<dyn FsLock>> {
        Ok(Box::new(NopLock))
    }

    fn walk(&self, _root: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}
