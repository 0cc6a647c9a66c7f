//! Memory-Mapped Region di atas SharedHandle
//!
//! Byte range hasil mmap dibungkus `SharedHandle` yang release action-nya
//! flush + unmap. Semua duplicate berbagi mapping yang sama:
//! - Zero-copy: `bytes()` langsung menunjuk ke page cache
//! - Write-through: write lewat satu handle terlihat di handle lain
//! - Exactly-once unmap: owner terakhir yang close melepas mapping
//!
//! Region kosong (sentinel) tidak pernah menyentuh filesystem atau mmap.

use memmap2::{Mmap, MmapMut};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::slice;

use log::{debug, warn};

use super::shared::SharedHandle;
use crate::error::{Error, Result};

/// Prefix default untuk temp file hasil `from_bytes`
pub const DEFAULT_PREFIX: &str = "memmapped";

/// Mode akses region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Sentinel: tidak ada mapping
    Empty,
    ReadOnly,
    ReadWrite,
}

/// Payload yang dibagi lewat SharedHandle
enum Mapping {
    Empty,
    ReadOnly(Mmap),
    // ptr diambil dari `as_mut_ptr()` saat konstruksi, selagi kita masih
    // punya `&mut MmapMut`. Alamat mapping tidak berubah walau MmapMut dipindah.
    ReadWrite { map: MmapMut, ptr: *mut u8 },
}

// SAFETY: `ptr` hanya alias dari mapping milik `map`, yang sendiri Send + Sync.
// Sinkronisasi akses ke isi mapping adalah tanggung jawab caller.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    fn release(self) -> Result<()> {
        match self {
            Mapping::ReadWrite { map, .. } => {
                // msync sebelum munmap supaya error-nya sampai ke caller
                let flushed = map.flush().map_err(|source| Error::Release { source });
                drop(map);
                flushed
            }
            Mapping::ReadOnly(map) => {
                drop(map);
                Ok(())
            }
            Mapping::Empty => Ok(()),
        }
    }
}

/// Memory-mapped byte range dengan shared ownership
///
/// `len` dan `access` di-cache di sini karena tidak pernah berubah selama
/// mapping hidup; membacanya tidak perlu menyentuh payload.
pub struct MappedRegion {
    handle: SharedHandle<Mapping>,
    len: usize,
    access: Access,
}

impl MappedRegion {
    fn from_mapping(mapping: Mapping, len: usize, access: Access) -> Self {
        let handle = match access {
            Access::Empty => SharedHandle::new(mapping),
            _ => SharedHandle::with_release(mapping, Mapping::release),
        };
        Self {
            handle,
            len,
            access,
        }
    }

    /// Sentinel region: panjang 0, tanpa I/O, close selalu sukses
    pub fn empty() -> Self {
        Self::from_mapping(Mapping::Empty, 0, Access::Empty)
    }

    fn map_file(file: &File, read_only: bool, path: Option<&Path>) -> Result<Self> {
        let map_err = |source| Error::Map {
            path: path.map(Path::to_path_buf),
            source,
        };

        let region = if read_only {
            // SAFETY: mapping MAP_SHARED atas file; modifikasi file dari luar
            // terlihat lewat view, seperti semantik mmap biasa
            let map = unsafe { Mmap::map(file) }.map_err(map_err)?;
            let len = map.len();
            Self::from_mapping(Mapping::ReadOnly(map), len, Access::ReadOnly)
        } else {
            // SAFETY: sama seperti di atas, file dibuka read-write
            let mut map = unsafe { MmapMut::map_mut(file) }.map_err(map_err)?;
            let len = map.len();
            let ptr = map.as_mut_ptr();
            Self::from_mapping(Mapping::ReadWrite { map, ptr }, len, Access::ReadWrite)
        };

        debug!(
            "mapped {} bytes ({:?}) from {}",
            region.len,
            region.access,
            path.map_or_else(|| "open file".to_string(), |p| p.display().to_string())
        );
        Ok(region)
    }

    /// Map seluruh panjang file saat ini.
    ///
    /// Descriptor boleh ditutup setelah fungsi ini return; mapping tetap valid.
    pub fn from_open_file(file: &File, read_only: bool) -> Result<Self> {
        Self::map_file(file, read_only, None)
    }

    /// Tulis `data` ke temp file lalu map read-write.
    ///
    /// Data kosong menghasilkan sentinel tanpa I/O. Jika `directory` None,
    /// dipakai `std::env::temp_dir()`.
    ///
    /// Temp file ditutup dan di-unlink segera setelah mmap() berhasil. Di
    /// sistem POSIX mapping tetap valid setelah fd ditutup dan entry
    /// direktorinya dihapus; page-nya baru dilepas kernel saat munmap.
    pub fn from_bytes(data: &[u8], directory: Option<&Path>) -> Result<Self> {
        Self::from_bytes_with_prefix(data, directory, DEFAULT_PREFIX)
    }

    /// Seperti `from_bytes`, dengan prefix nama temp file sendiri
    pub fn from_bytes_with_prefix(
        data: &[u8],
        directory: Option<&Path>,
        prefix: &str,
    ) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::empty());
        }

        let directory = directory
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(&directory)
            .map_err(|source| Error::CreateTemp {
                directory: directory.clone(),
                source,
            })?;

        file.write_all(data).map_err(|source| Error::Write {
            path: file.path().to_path_buf(),
            source,
        })?;

        let region = Self::map_file(file.as_file(), false, Some(file.path()));

        // Close fd + unlink. Gagal unlink tidak membatalkan mapping.
        let path = file.path().to_path_buf();
        if let Err(e) = file.close() {
            warn!("failed to remove temp file {:?}: {}", path, e);
        }

        region
    }

    /// Buka `path` lalu map read-only atau read-write
    pub fn from_path<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::map_file(&file, read_only, Some(path))
    }

    /// Owner baru atas mapping yang sama
    ///
    /// # Panics
    /// Panic jika mapping sudah di-release.
    pub fn duplicate(&self) -> Self {
        Self {
            handle: self.handle.duplicate(),
            len: self.len,
            access: self.access,
        }
    }

    /// Referensi lain ke owner slot yang sama (bukan owner baru)
    pub fn alias(&self) -> Self {
        Self {
            handle: self.handle.alias(),
            len: self.len,
            access: self.access,
        }
    }

    /// View read-only langsung ke mapping. Kosong untuk sentinel.
    ///
    /// # Panics
    /// Panic jika mapping sudah di-release.
    ///
    /// # Safety
    /// View tidak boleh dipakai setelah close terakhir atas mapping ini, dan
    /// tidak disinkronkan terhadap write lewat `bytes_mut()` di handle lain.
    pub unsafe fn bytes(&self) -> &[u8] {
        match self.handle.get() {
            Mapping::Empty => &[],
            Mapping::ReadOnly(map) => &map[..],
            Mapping::ReadWrite { map, ptr } => slice::from_raw_parts(*ptr, map.len()),
        }
    }

    /// View mutable langsung ke mapping read-write.
    ///
    /// Returns `None` untuk mapping read-only, slice kosong untuk sentinel.
    /// Write terlihat di semua handle atas mapping yang sama dan akhirnya
    /// tersimpan ke file.
    ///
    /// # Panics
    /// Panic jika mapping sudah di-release.
    ///
    /// # Safety
    /// Sama seperti `bytes()`, ditambah: caller menjamin tidak ada view lain
    /// (di thread mana pun) yang membaca atau menulis range yang sama selama
    /// view ini dipakai.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bytes_mut(&self) -> Option<&mut [u8]> {
        match self.handle.get() {
            Mapping::Empty => Some(&mut []),
            Mapping::ReadOnly(_) => None,
            Mapping::ReadWrite { map, ptr } => Some(slice::from_raw_parts_mut(*ptr, map.len())),
        }
    }

    /// Salin isi mapping ke Vec. Aman terhadap close konkuren.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.handle.with(|mapping| match mapping {
            Mapping::Empty => Vec::new(),
            Mapping::ReadOnly(map) => map.to_vec(),
            Mapping::ReadWrite { map, .. } => map.to_vec(),
        })
    }

    /// msync mapping read-write ke file. No-op untuk read-only/sentinel.
    pub fn flush(&self) -> Result<()> {
        let flushed = self.handle.with(|mapping| match mapping {
            Mapping::ReadWrite { map, .. } => map.flush(),
            _ => Ok(()),
        })?;
        flushed.map_err(|source| Error::Flush { source })
    }

    /// True jika handle ini sudah close
    #[inline(always)]
    pub fn is_released(&self) -> bool {
        self.handle.is_closed()
    }

    /// Close handle ini. Owner terakhir melakukan flush + unmap.
    pub fn close(&self) -> Result<()> {
        self.handle.close()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn access(&self) -> Access {
        self.access
    }

    #[inline(always)]
    pub fn is_read_only(&self) -> bool {
        self.access == Access::ReadOnly
    }

    #[inline(always)]
    pub fn is_sentinel(&self) -> bool {
        self.access == Access::Empty
    }

    /// Jumlah owner yang masih hidup atas mapping ini
    pub fn owners(&self) -> usize {
        self.handle.owners()
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("len", &self.len)
            .field("access", &self.access)
            .field("handle", &self.handle)
            .finish()
    }
}
