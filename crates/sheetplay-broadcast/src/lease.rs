//! Cross-process exclusivity for broadcasting one sheet.
//!
//! Several host processes may load the same sheet. Only the holder of the
//! lease for `(sheet path, port, sheet mtime)` broadcasts; the others retry
//! until the holder exits. The lease is an exclusive advisory lock on a file
//! in the temp directory, released when the [`BroadcastLease`] is dropped.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, trace};

/// Identity of a lease: a hash of sheet path, port and sheet modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseKey(u64);

impl LeaseKey {
    /// Key for `sheet_path` on `port`. A missing file hashes with mtime 0.
    pub fn new(sheet_path: &Path, port: u16) -> Self {
        let mtime = fs::metadata(sheet_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| (d.as_secs(), d.subsec_nanos()))
            .unwrap_or_default();
        Self::from_parts(sheet_path, port, mtime)
    }

    fn from_parts(sheet_path: &Path, port: u16, mtime: (u64, u32)) -> Self {
        let mut hasher = DefaultHasher::new();
        sheet_path.hash(&mut hasher);
        port.hash(&mut hasher);
        mtime.hash(&mut hasher);
        Self(hasher.finish())
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    fn lock_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("sheetplay-broadcast-{:016x}.lock", self.0))
    }
}

/// Held exclusive right to broadcast for one [`LeaseKey`].
#[derive(Debug)]
pub struct BroadcastLease {
    key: LeaseKey,
    file: File,
    path: PathBuf,
}

impl BroadcastLease {
    /// Try to take the lease in the system temp directory.
    ///
    /// `Ok(None)` means another holder has it.
    pub fn try_acquire(key: LeaseKey) -> Result<Option<Self>> {
        Self::try_acquire_in(key, &std::env::temp_dir())
    }

    /// Like [`try_acquire`](Self::try_acquire) with an explicit lock directory.
    pub fn try_acquire_in(key: LeaseKey, dir: &Path) -> Result<Option<Self>> {
        let path = key.lock_path(dir);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::Lease(format!("{}: {e}", path.display())))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired broadcast lease {}", path.display());
                Ok(Some(Self { key, file, path }))
            }
            Err(e) if is_contended(&e) => {
                trace!("Broadcast lease {} held elsewhere", path.display());
                Ok(None)
            }
            Err(e) => Err(Error::Lease(format!("{}: {e}", path.display()))),
        }
    }

    #[inline]
    pub fn key(&self) -> LeaseKey {
        self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BroadcastLease {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Released broadcast lease {}", self.path.display());
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
