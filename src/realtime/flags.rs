use core::{
    marker::PhantomData,
    sync::atomic::{AtomicU8, Ordering},
};

use bitflags::Flags;

/// A `u8` flag set shared between interrupt handlers and the main loop.
///
/// Loads are single atomic operations. Every store, including a whole-value
/// assign, runs inside a critical section so it cannot land between the load
/// and store of a concurrent set, clear or take. This also works on cores
/// without atomic RMW instructions.
pub struct AtomicFlags<F> {
    bits: AtomicU8,
    _flags: PhantomData<F>,
}

impl<F: Flags<Bits = u8>> AtomicFlags<F> {
    /// Creates a cell with no bits set.
    pub const fn empty() -> Self {
        Self {
            bits: AtomicU8::new(0),
            _flags: PhantomData,
        }
    }

    /// Current value. Bits without a named flag are kept.
    #[inline]
    pub fn get(&self) -> F {
        F::from_bits_retain(self.bits.load(Ordering::Acquire))
    }

    /// Replaces the whole value.
    #[inline]
    pub fn assign(&self, value: F) {
        self.update(|_| value.bits());
    }

    /// Sets every bit of `mask`.
    pub fn set(&self, mask: F) {
        self.update(|bits| bits | mask.bits());
    }

    /// Clears every bit of `mask`.
    pub fn clear(&self, mask: F) {
        self.update(|bits| bits & !mask.bits());
    }

    /// Returns the current value and clears it in one step.
    pub fn take(&self) -> F {
        F::from_bits_retain(self.update(|_| 0))
    }

    /// Returns true if any bit of `mask` is set.
    #[inline]
    pub fn intersects(&self, mask: F) -> bool {
        self.bits.load(Ordering::Acquire) & mask.bits() != 0
    }

    // Returns the previous bits.
    fn update(&self, f: impl FnOnce(u8) -> u8) -> u8 {
        critical_section::with(|_| {
            let old = self.bits.load(Ordering::Acquire);
            self.bits.store(f(old), Ordering::Release);
            old
        })
    }
}

impl<F: Flags<Bits = u8>> Default for AtomicFlags<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F: Flags<Bits = u8> + core::fmt::Debug> core::fmt::Debug for AtomicFlags<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("AtomicFlags").field(&self.get()).finish()
    }
}
