//! File-backed audit log.
//!
//! Each transaction becomes one file under the root directory, named by the
//! base64url (no padding) encoding of an RFC3339 nanosecond timestamp. The
//! file carries the `.active` suffix while being written; once its contents
//! are fsynced it is renamed to `.flushed`, which is the durability point.
//!
//! A crash can leave `.active` files behind. Opening the log runs a
//! recovery sweep that renames any stale `.active` file to `.failed`, so a
//! later reader can distinguish complete batches from interrupted ones. The
//! root directory is protected by a `LOCK` file.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::fs::Filesystem;
use crate::types::Transaction;

use super::{row, AuditLog, Result};

/// Suffix of a batch file still being written.
const ACTIVE: &str = ".active";

/// Suffix of a durably written batch file.
const FLUSHED: &str = ".flushed";

/// Suffix given to interrupted batch files by the recovery sweep.
const FAILED: &str = ".failed";

/// Name of the root lock file.
const LOCK_FILE: &str = "LOCK";

/// Configuration for [`LocalLog`].
#[derive(Debug, Clone)]
pub struct LocalLogConfig {
    /// Directory that owns this log's batch files.
    pub root: PathBuf,
}

/// File-backed [`AuditLog`].
pub struct LocalLog {
    root: PathBuf,
    fs: Arc<dyn Filesystem>,
}

impl LocalLog {
    /// Opens the log: creates the root, takes the lock once to verify it is
    /// acquirable, and sweeps stale `.active` files to `.failed`.
    pub fn open(config: LocalLogConfig, fs: Arc<dyn Filesystem>) -> Result<Self> {
        fs.mkdir_all(&config.root)?;

        let lock_path = config.root.join(LOCK_FILE);
        let lock = fs.lock(&lock_path)?;
        let log = LocalLog {
            root: config.root,
            fs,
        };
        log.recover()?;
        drop(lock);

        Ok(log)
    }

    /// Renames every stale `.active` file under the root to `.failed`.
    fn recover(&self) -> Result<()> {
        let mut recovered = 0usize;
        for path in self.fs.walk(&self.root)? {
            if path.extension().is_some_and(|ext| ext == "active") {
                let failed = path.with_extension(&FAILED[1..]);
                self.fs.rename(&path, &failed)?;
                recovered += 1;
            }
        }
        if recovered > 0 {
            info!(recovered, root = %self.root.display(), "recovered stale audit batches");
        }
        Ok(())
    }

    /// A fresh batch file name from the current wall clock.
    fn batch_name(&self) -> String {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        URL_SAFE_NO_PAD.encode(timestamp)
    }
}

#[async_trait]
impl AuditLog for LocalLog {
    async fn append(&self, txn: &Transaction) -> Result<()> {
        let lock_path = self.root.join(LOCK_FILE);
        let _lock = self.fs.lock(&lock_path)?;

        let name = self.batch_name();
        let active = self.root.join(format!("{name}{ACTIVE}"));

        let mut file = self.fs.create(&active)?;
        txn.walk(|_, record| file.write_all(&row(record)))?;
        file.sync()?;
        drop(file);

        let flushed = self.root.join(format!("{name}{FLUSHED}"));
        self.fs.rename(&active, &flushed)?;

        debug!(batch = %name, records = txn.len(), "audit batch flushed");
        Ok(())
    }
}
