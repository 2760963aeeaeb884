//! File assembler: preallocated `.part` file, positional writes, atomic
//! rename on finish.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use super::{check_len, Assembler};
use crate::control::lock;
use crate::planner::{ByteRange, RangeBitmap};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Writes ranges into `<dest>.part` and renames it to `<dest>` on finish.
///
/// Writes are positional (pwrite on unix), so workers never contend on a
/// file cursor; the `RwLock` only keeps writers out while the file is being
/// closed for the rename.
pub struct FileAssembler {
    file: RwLock<Option<File>>,
    accepted: Mutex<RangeBitmap>,
    range_count: AtomicUsize,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl FileAssembler {
    /// Create (or truncate) `<final_path>.part`.
    pub fn create(final_path: &Path) -> Result<Self> {
        let temp_path = temp_path(final_path);
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("failed to create temp file: {}", temp_path.display()))?;
        Ok(Self {
            file: RwLock::new(Some(file)),
            accepted: Mutex::new(RangeBitmap::default()),
            range_count: AtomicUsize::new(0),
            temp_path,
            final_path: final_path.to_path_buf(),
        })
    }

    /// Path to the current temp file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Preallocate `size` bytes. On Unix tries `posix_fallocate` for real block
    /// allocation; falls back to `set_len` on failure or non-Unix.
    fn preallocate(file: &File, size: u64) -> Result<()> {
        #[cfg(unix)]
        {
            let r = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        file.set_len(size).context("failed to preallocate file")?;
        Ok(())
    }

    #[cfg(unix)]
    fn write_at(file: &File, offset: u64, data: &[u8]) -> std::io::Result<()> {
        use std::os::unix::fs::FileExt;
        file.write_all_at(data, offset)
    }

    #[cfg(windows)]
    fn write_at(file: &File, mut offset: u64, mut data: &[u8]) -> std::io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !data.is_empty() {
            let n = file.seek_write(data, offset)?;
            if n == 0 {
                return Err(std::io::ErrorKind::WriteZero.into());
            }
            data = &data[n..];
            offset += n as u64;
        }
        Ok(())
    }
}

impl Assembler for FileAssembler {
    fn prepare(&self, content_length: Option<u64>, range_count: usize) -> Result<()> {
        *lock(&self.accepted) = RangeBitmap::new(range_count);
        self.range_count.store(range_count, Ordering::Relaxed);
        let guard = self.file.read().unwrap_or_else(|e| e.into_inner());
        let file = guard.as_ref().context("output already finalized")?;
        if let Some(len) = content_length.filter(|&len| len > 0) {
            Self::preallocate(file, len)?;
        }
        Ok(())
    }

    fn write(&self, range: &ByteRange, bytes: &[u8]) -> Result<()> {
        check_len(range, bytes)?;
        if lock(&self.accepted).contains(range.id) {
            tracing::debug!(range = range.id, "duplicate write ignored");
            return Ok(());
        }
        {
            let guard = self.file.read().unwrap_or_else(|e| e.into_inner());
            let file = guard.as_ref().context("output already finalized")?;
            Self::write_at(file, range.start, bytes).with_context(|| {
                format!(
                    "write of range {} at offset {} to {} failed",
                    range.id,
                    range.start,
                    self.temp_path.display()
                )
            })?;
        }
        lock(&self.accepted).insert(range.id);
        Ok(())
    }

    /// Sync and rename `.part` to the final path. Refuses while any planned
    /// range is missing, leaving the `.part` file for `abandon`.
    fn finish(&self) -> Result<()> {
        let range_count = self.range_count.load(Ordering::Relaxed);
        {
            let accepted = lock(&self.accepted);
            if !accepted.all(range_count) {
                anyhow::bail!(
                    "only {} of {} ranges were written",
                    accepted.count(),
                    range_count
                );
            }
        }
        let file = self
            .file
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .context("output already finalized")?;
        file.sync_all().context("storage sync failed")?;
        drop(file);
        std::fs::rename(&self.temp_path, &self.final_path).with_context(|| {
            format!(
                "failed to rename {} to {}",
                self.temp_path.display(),
                self.final_path.display()
            )
        })?;
        tracing::debug!(path = %self.final_path.display(), "output finalized");
        Ok(())
    }

    /// Close and remove the `.part` file.
    fn abandon(&self) -> Result<()> {
        let file = self.file.write().unwrap_or_else(|e| e.into_inner()).take();
        if file.is_none() {
            return Ok(());
        }
        drop(file);
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove {}", self.temp_path.display())),
        }
    }
}
