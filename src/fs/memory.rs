//! In-memory filesystem used by tests and the CLI's `virtual` value.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{Filesystem, FsFile, FsLock};

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
    locked: HashSet<PathBuf>,
}

/// [`Filesystem`] over a shared in-process map.
///
/// Unlike the disk variant, the lock here is enforced: a second `lock` on
/// the same path fails until the first guard drops. Writes become visible
/// in the map on `sync` (or when the handle drops), mirroring the way disk
/// contents only count once synced.
#[derive(Debug, Default, Clone)]
pub struct MemoryFilesystem {
    state: Arc<Mutex<State>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        MemoryFilesystem::default()
    }

    /// Reads a file's synced contents. For tests.
    pub fn read(&self, path: &Path) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }
}

struct MemoryFile {
    state: Arc<Mutex<State>>,
    path: PathBuf,
    buffer: Vec<u8>,
}

impl io::Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FsFile for MemoryFile {
    fn sync(&mut self) -> io::Result<()> {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(self.path.clone(), self.buffer.clone());
        Ok(())
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        let _ = self.sync();
    }
}

struct MemoryLock {
    state: Arc<Mutex<State>>,
    path: PathBuf,
}

impl FsLock for MemoryLock {}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        self.state.lock().unwrap().locked.remove(&self.path);
    }
}

impl Filesystem for MemoryFilesystem {
    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        self.state.lock().unwrap().dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn FsFile>> {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryFile {
            state: self.state.clone(),
            path: path.to_path_buf(),
            buffer: Vec::new(),
        }))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.files.remove(from) {
            Some(contents) => {
                state.files.insert(to.to_path_buf(), contents);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", from.display()),
            )),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn lock(&self, path: &Path) -> io::Result<Box<dyn FsLock>> {
        let mut state = self.state.lock().unwrap();
        if !state.locked.insert(path.to_path_buf()) {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("already locked: {}", path.display()),
            ));
        }
        Ok(Box::new(MemoryLock {
            state: self.state.clone(),
            path: path.to_path_buf(),
        }))
    }

    fn walk(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .files
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect())
    }
}
