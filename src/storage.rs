//! Memory-Mapped Storage Factory
//!
//! Setiap `add()` menulis buffer ke temp file baru di direktori storage,
//! me-map-nya read-write, lalu langsung menghapus file-nya:
//! - Zero-copy read: data dibaca langsung dari mapping
//! - Kernel-managed paging: OS menangani swap in/out
//! - Tanpa sisa file: entry direktori dihapus segera setelah mmap()

use std::path::{Path, PathBuf};

use log::debug;

use crate::core::{MappedRegion, DEFAULT_PREFIX};
use crate::error::{Error, Result};

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub directory: PathBuf,
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Factory untuk region yang di-backing temp file
#[derive(Debug)]
pub struct Storage {
    directory: PathBuf,
    prefix: String,
}

impl Storage {
    /// Membuat storage dan mengecek write access sekali
    ///
    /// # Arguments
    /// * `directory` - Direktori untuk temp file
    /// * `prefix` - Prefix nama temp file
    pub fn new<P: AsRef<Path>>(directory: P, prefix: &str) -> Result<Self> {
        Self::with_config(StorageConfig {
            directory: directory.as_ref().to_path_buf(),
            prefix: prefix.to_string(),
        })
    }

    pub fn with_config(config: StorageConfig) -> Result<Self> {
        // Probe: buat lalu hapus temp file untuk cek hak tulis
        let probe_err = |source| Error::Probe {
            directory: config.directory.clone(),
            source,
        };
        let probe = tempfile::Builder::new()
            .prefix(&config.prefix)
            .tempfile_in(&config.directory)
            .map_err(probe_err)?;
        probe.close().map_err(probe_err)?;

        debug!(
            "storage ready in {:?} with prefix {:?}",
            config.directory, config.prefix
        );
        Ok(Self {
            directory: config.directory,
            prefix: config.prefix,
        })
    }

    /// Simpan `data` sebagai region read-write. Data kosong -> sentinel.
    pub fn add(&self, data: &[u8]) -> Result<MappedRegion> {
        MappedRegion::from_bytes_with_prefix(data, Some(&self.directory), &self.prefix)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
