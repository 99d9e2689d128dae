//! On-disk safe files.

use anyhow::{Context, Result};
use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::container::{decode, encode};
use crate::safe::Safe;

/// Program name recorded in the header of every file written here.
pub const PROGRAM_NAME: &str = concat!("pwsafe3 ", env!("CARGO_PKG_VERSION"));

/// A `.psafe3` file on disk.
///
/// Writes go to a temporary sibling that is synced and then renamed over the
/// target, so a crash leaves either the old or the new database.
#[derive(Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Creates a new `Storage` for the safe file at `path`.
    ///
    /// Nothing is touched on disk until [`save`](Self::save) or [`write`](Self::write).
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Checks whether the safe file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns the path of the safe file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads the raw, still encrypted file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be read.
    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Reads and decodes the safe.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not decode. The
    /// underlying [`SafeError`](crate::SafeError) can be recovered with `downcast_ref`.
    pub fn open(&self, passphrase: &str) -> Result<Safe> {
        let data = self.load()?;
        let safe = decode(&data, passphrase)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        debug!(path = %self.path.display(), records = safe.records.len(), "opened safe");
        Ok(safe)
    }

    /// Encodes `safe` under `passphrase` and saves it.
    ///
    /// The written copy carries fresh last-save metadata (time, program, user and
    /// host); `safe` itself is left as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the file cannot be written.
    pub fn write(&self, safe: &Safe, passphrase: &str) -> Result<()> {
        let mut stamped = safe.clone();
        stamped.stamp_save(PROGRAM_NAME);
        let data = encode(&stamped, passphrase).context("failed to encode safe")?;
        self.save(&data)
    }

    /// Atomically replaces the file with `data`, creating parent directories.
    ///
    /// The data goes to a temporary sibling first, is synced, and is then moved
    /// over the target.
    ///
    /// # Errors
    ///
    /// Returns an error if any filesystem step fails. The temporary file is
    /// removed if the final replace fails.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.random_tmp_path()?;

        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .context("failed to create temporary file")?;

        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                File::open(parent)?.sync_all()?;
            }
        }

        debug!(path = %self.path.display(), bytes = data.len(), "saved safe");
        Ok(())
    }

    /// `<name>.tmp.<16 hex chars>` next to the target.
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8];
        fill(&mut buf).map_err(|_| anyhow::anyhow!("OS random generator unavailable"))?;

        let suffix: String = buf.iter().map(|b| format!("{b:02x}")).collect();
        let file_name = self
            .path
            .file_name()
            .context("safe path has no file name")?
            .to_string_lossy();

        Ok(self.path.with_file_name(format!("{file_name}.tmp.{suffix}")))
    }

    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        if !self.path.exists() {
            fs::rename(tmp_path, &self.path)?;
            return Ok(());
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY: both buffers are NUL-terminated UTF-16 and outlive the call.
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context("atomic replace failed");
        }

        Ok(())
    }

    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SafeError;
    use crate::safe::Record;
    use tempfile::tempdir;

    #[test]
    fn write_then_open() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("db.psafe3"));

        let mut safe = Safe::new();
        let mut record = Record::new();
        record.title = "Bank".into();
        safe.records.push(record);

        storage.write(&safe, "pw").unwrap();
        let opened = storage.open("pw").unwrap();

        assert_eq!(opened.records, safe.records);
        assert_eq!(opened.headers.program, PROGRAM_NAME);
        assert!(opened.headers.last_save.is_some());
    }

    #[test]
    fn write_leaves_caller_model_untouched() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("db.psafe3"));
        let safe = Safe::new();

        storage.write(&safe, "pw").unwrap();

        assert_eq!(safe, Safe::new());
        assert!(safe.headers.last_save.is_none());
        assert!(safe.headers.program.is_empty());
    }

    #[test]
    fn open_with_wrong_passphrase_keeps_error_kind() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("db.psafe3"));
        storage.write(&Safe::new(), "pw").unwrap();

        let err = storage.open("nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SafeError>(),
            Some(SafeError::InvalidPassphrase)
        ));
    }

    #[test]
    fn load_fails_if_file_does_not_exist() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("missing.psafe3"));

        assert!(!storage.exists());
        assert!(storage.load().is_err());
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.psafe3");
        let storage = Storage::new(path.clone());

        storage.save(b"first").unwrap();
        storage.save(b"second").unwrap();

        assert_eq!(fs::read(path).unwrap(), b"second");
    }

    #[test]
    fn tmp_file_is_removed_after_success() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("db.psafe3"));
        storage.save(b"data").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        assert_eq!(entries, vec!["db.psafe3"]);
    }

    #[test]
    fn tmp_path_is_unique_sibling() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.psafe3");
        let storage = Storage::new(path.clone());

        let a = storage.random_tmp_path().unwrap();
        let b = storage.random_tmp_path().unwrap();

        assert_eq!(a.parent(), path.parent());
        assert_ne!(a, path);
        assert_ne!(a, b);
    }

    #[test]
    fn parent_directory_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("db.psafe3");

        Storage::new(nested.clone()).save(b"data").unwrap();
        assert!(nested.exists());
    }
}
