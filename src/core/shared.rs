//! Lock-Free Shared Ownership Handle
//!
//! Reference counting untuk resource opaque (misalnya mapping) dengan
//! release action yang dijalankan tepat satu kali, saat owner terakhir close.
//!
//! Dua operasi yang sengaja dipisah:
//! - `alias()`: referensi lain ke owner slot yang SAMA (tidak menambah owner)
//! - `duplicate()`: owner BARU dengan closed-flag sendiri (owner count +1)
//!
//! Tidak ada Mutex. Serialization point-nya adalah CAS pada closed-flag
//! per slot dan fetch_sub pada owner count bersama.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{fence, AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::error::Result;

/// Release action: menerima payload by value, boleh gagal
pub type ReleaseFn<T> = Box<dyn FnOnce(T) -> Result<()> + Send>;

/// Resource bersama - satu per `with_release`/`new`, dibagi semua duplicate
struct Resource<T> {
    owners: AtomicUsize,
    payload: UnsafeCell<Option<T>>,
    release: UnsafeCell<Option<ReleaseFn<T>>>,
}

// SAFETY: payload hanya dibaca lewat `&T` selama owners > 0, dan hanya
// di-`take()` oleh satu thread yang membawa owners dari 1 ke 0.
// Release action hanya disentuh oleh thread yang sama.
unsafe impl<T: Send> Send for Resource<T> {}
unsafe impl<T: Send + Sync> Sync for Resource<T> {}

impl<T> Resource<T> {
    #[inline(always)]
    fn assert_alive(&self, op: &str) {
        if self.owners.load(Ordering::Acquire) == 0 {
            panic!("SharedHandle::{op} called on a released resource");
        }
    }

    /// Tambah satu owner. Tidak pernah menghidupkan kembali count 0.
    fn acquire(&self, op: &str) -> usize {
        let mut current = self.owners.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                panic!("SharedHandle::{op} called on a released resource");
            }
            match self.owners.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current + 1,
                Err(c) => current = c,
            }
        }
    }

    /// Lepas satu owner. Owner terakhir menjalankan release action.
    fn release_one(&self) -> Result<()> {
        let previous = self.owners.fetch_sub(1, Ordering::Release);
        debug_assert!(previous > 0, "owner count underflow");
        if previous != 1 {
            trace!("owner released, {} remaining", previous - 1);
            return Ok(());
        }

        // Acquire fence: semua write dari owner lain visible sebelum release
        fence(Ordering::Acquire);

        // SAFETY: hanya satu thread yang bisa melihat previous == 1,
        // dan setelah ini owners == 0 sehingga get/duplicate akan panic
        let payload = unsafe { (*self.payload.get()).take() };
        let release = unsafe { (*self.release.get()).take() };

        debug!("last owner closed, releasing resource");
        match (payload, release) {
            (Some(payload), Some(release)) => release(payload),
            (Some(payload), None) => {
                drop(payload);
                Ok(())
            }
            (None, _) => Ok(()),
        }
    }
}

/// Owner sementara untuk `with()`; dilepas juga saat unwind
struct TempOwner<'a, T>(&'a Resource<T>);

impl<T> Drop for TempOwner<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.0.release_one() {
            warn!("release failed while unwinding: {}", e);
        }
    }
}

/// Satu owner slot. Semua alias dari slot ini berbagi `closed`.
struct OwnerSlot<T> {
    closed: AtomicBool,
    resource: Arc<Resource<T>>,
}

impl<T> OwnerSlot<T> {
    fn close(&self) -> Result<()> {
        // CAS: hanya transisi pertama false -> true yang mengurangi count
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        self.resource.release_one()
    }
}

impl<T> Drop for OwnerSlot<T> {
    fn drop(&mut self) {
        // Alias terakhir hilang tanpa close(): close implisit
        if let Err(e) = self.close() {
            warn!("release failed while dropping unclosed handle: {}", e);
        }
    }
}

/// Handle reference-counted ke resource bersama
///
/// Sengaja tidak mengimplementasikan `Clone`: pilih `alias()` atau
/// `duplicate()` secara eksplisit.
pub struct SharedHandle<T> {
    slot: Arc<OwnerSlot<T>>,
}

impl<T> SharedHandle<T> {
    /// Membuat handle tanpa release action. Payload di-drop saat owner
    /// terakhir close.
    pub fn new(payload: T) -> Self {
        Self::from_parts(payload, None)
    }

    /// Membuat handle dengan release action. Owner count = 1.
    pub fn with_release<F>(payload: T, release: F) -> Self
    where
        F: FnOnce(T) -> Result<()> + Send + 'static,
    {
        Self::from_parts(payload, Some(Box::new(release)))
    }

    fn from_parts(payload: T, release: Option<ReleaseFn<T>>) -> Self {
        let resource = Arc::new(Resource {
            owners: AtomicUsize::new(1),
            payload: UnsafeCell::new(Some(payload)),
            release: UnsafeCell::new(release),
        });
        Self {
            slot: Arc::new(OwnerSlot {
                closed: AtomicBool::new(false),
                resource,
            }),
        }
    }

    /// Owner baru atas resource yang sama, dengan closed-flag sendiri.
    ///
    /// # Panics
    /// Panic jika resource sudah di-release (owner count sudah 0).
    pub fn duplicate(&self) -> Self {
        let owners = self.slot.resource.acquire("duplicate");
        trace!("handle duplicated, {} owners", owners);
        Self {
            slot: Arc::new(OwnerSlot {
                closed: AtomicBool::new(false),
                resource: Arc::clone(&self.slot.resource),
            }),
        }
    }

    /// Referensi lain ke owner slot yang sama. Tidak menambah owner.
    #[inline(always)]
    pub fn alias(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Akses payload.
    ///
    /// # Panics
    /// Panic jika resource sudah di-release.
    ///
    /// # Safety
    /// Referensi yang dikembalikan tidak boleh hidup melewati close terakhir
    /// atas resource ini (dari thread mana pun, lewat handle mana pun).
    #[inline(always)]
    pub unsafe fn get(&self) -> &T {
        let resource = &self.slot.resource;
        resource.assert_alive("get");
        match (*resource.payload.get()).as_ref() {
            Some(payload) => payload,
            None => panic!("SharedHandle::get called on a released resource"),
        }
    }

    /// Akses payload yang aman terhadap close konkuren.
    ///
    /// Selama `f` berjalan, resource ditahan oleh owner sementara sehingga
    /// close dari thread lain tidak bisa me-release-nya. Jika owner
    /// sementara ini ternyata yang terakhir, release action jalan di sini
    /// dan error-nya dikembalikan.
    ///
    /// # Panics
    /// Panic jika resource sudah di-release.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let resource = &*self.slot.resource;
        resource.acquire("with");
        let pin = TempOwner(resource);

        // SAFETY: pin menahan owners > 0 sampai release_one di bawah
        let out = match unsafe { (*resource.payload.get()).as_ref() } {
            Some(payload) => f(payload),
            None => panic!("SharedHandle::with called on a released resource"),
        };

        std::mem::forget(pin);
        resource.release_one()?;
        Ok(out)
    }

    /// True jika owner slot ini (bukan resource-nya) sudah close
    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.slot.closed.load(Ordering::Acquire)
    }

    /// True jika semua owner sudah close dan release action sudah jalan
    #[inline(always)]
    pub fn is_released(&self) -> bool {
        self.slot.resource.owners.load(Ordering::Acquire) == 0
    }

    /// Jumlah owner yang masih hidup
    #[inline(always)]
    pub fn owners(&self) -> usize {
        self.slot.resource.owners.load(Ordering::Acquire)
    }

    /// Close owner slot ini. Idempotent.
    ///
    /// Close yang membawa owner count ke 0 menjalankan release action dan
    /// mengembalikan error-nya. Slot tetap ditandai closed walau release gagal.
    pub fn close(&self) -> Result<()> {
        self.slot.close()
    }
}

impl<T> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("closed", &self.is_closed())
            .field("owners", &self.owners())
            .finish()
    }
}
