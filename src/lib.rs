//! memshare - Reference-Counted Memory-Mapped Regions
//!
//! Arsitektur:
//! - `SharedHandle`: owner count bersama + closed-flag per owner, lock-free
//! - `MappedRegion`: mapping memmap2 di atas `SharedHandle`, unmap tepat sekali
//! - `Storage`: factory yang menulis buffer ke temp file lalu me-map-nya
//!
//! ```no_run
//! use memshare::MappedRegion;
//!
//! # fn main() -> memshare::Result<()> {
//! let region = MappedRegion::from_bytes(b"hello", None)?;
//! let reader = region.duplicate();
//! region.close()?;
//! assert_eq!(reader.to_vec()?, b"hello");
//! reader.close()?; // owner terakhir: unmap di sini
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod storage;

pub use crate::core::{Access, MappedRegion, SharedHandle};
pub use crate::error::{Error, Result};
pub use crate::storage::{Storage, StorageConfig};
