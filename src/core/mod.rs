//! Core module: Shared ownership + Memory-Mapped Region
//!
//! Prinsip desain:
//! - Lock-Free: hanya atomic operations (CAS + fetch_add/fetch_sub), tanpa Mutex
//! - Exactly-Once: release action dijalankan oleh owner terakhir saja
//! - Zero-Copy: view langsung ke mapping, tanpa copy ke user space

mod mapped_region;
mod shared;

pub use mapped_region::{Access, MappedRegion, DEFAULT_PREFIX};
pub use shared::{ReleaseFn, SharedHandle};
