//! Base allocator seam
//!
//! The tracker never obtains memory on its own: every block it hands out or
//! frees goes through a [`BaseAllocator`]. The crate ships two:
//! - [`SystemAllocator`]: the C heap (`malloc`, `calloc`, `realloc`, `free`)
//! - [`CountingAllocator`]: a wrapper that counts operations and can be told
//!   to start failing, used to observe release-exactly-once behaviour
//!
//! # Safety
//!
//! Implementors promise that:
//! - `acquire` and `acquire_zeroed` return exclusive blocks of at least the
//!   requested size that stay valid until passed to `release` or `resize`
//! - `release` accepts any pointer previously returned by this allocator
//! - `resize` either returns a block holding the old contents (after which the
//!   old pointer is invalid) or fails and leaves the old block untouched

mod counting;
mod system;

use core::ptr::NonNull;

pub use self::counting::{AllocationCounts, CountingAllocator};
pub use self::system::SystemAllocator;
use crate::error::ScopeResult;

/// Raw acquire/release/resize primitives the tracker is built on
///
/// # Safety
///
/// See the module documentation for the contract every implementation must
/// uphold; the tracker frees through `release` on the strength of it.
pub unsafe trait BaseAllocator {
    /// Acquires an uninitialised block of `size` bytes
    fn acquire(&self, size: usize) -> ScopeResult<NonNull<u8>>;

    /// Acquires a zero-filled block of `size` bytes
    fn acquire_zeroed(&self, size: usize) -> ScopeResult<NonNull<u8>> {
        let ptr = self.acquire(size)?;
        // SAFETY: `acquire` returned an exclusive block of at least `size` bytes
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, size) };
        Ok(ptr)
    }

    /// Returns a block to the allocator
    ///
    /// # Safety
    /// - `ptr` must come from this allocator and must not have been released
    /// - `ptr` must not be used afterwards
    unsafe fn release(&self, ptr: NonNull<u8>);

    /// Resizes a block, possibly moving it
    ///
    /// # Safety
    /// - `ptr` must come from this allocator and must not have been released
    /// - on success `ptr` is invalid and only the returned pointer may be used
    /// - on failure `ptr` is still valid and still owned by the caller
    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> ScopeResult<NonNull<u8>>;
}

// SAFETY: forwards every call to `A`, preserving its contract
unsafe impl<A: BaseAllocator + ?Sized> BaseAllocator for &A {
    #[inline]
    fn acquire(&self, size: usize) -> ScopeResult<NonNull<u8>> {
        (**self).acquire(size)
    }

    #[inline]
    fn acquire_zeroed(&self, size: usize) -> ScopeResult<NonNull<u8>> {
        (**self).acquire_zeroed(size)
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: caller upholds `release`'s contract for `A`
        unsafe { (**self).release(ptr) }
    }

    #[inline]
    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> ScopeResult<NonNull<u8>> {
        // SAFETY: caller upholds `resize`'s contract for `A`
        unsafe { (**self).resize(ptr, new_size) }
    }
}

/// Byte size of an array of `count` elements of `size` bytes
///
/// Overflow is reported as `SizeOverflow`, which belongs to the
/// out-of-memory class the way `calloc` and `reallocarray` treat it.
pub(crate) fn array_size(count: usize, size: usize) -> ScopeResult<usize> {
    count
        .checked_mul(size)
        .ok_or_else(|| crate::error::ScopeError::size_overflow(count, size))
}
