//! System allocator implementation
//!
//! Delegates to the C heap. `malloc` and friends remember block sizes on their
//! own, which is exactly the shape the tracker needs: it records addresses
//! only and can free a block without knowing how large it was.

use core::ptr::NonNull;

use super::BaseAllocator;
use crate::error::{ScopeError, ScopeResult};

/// Wrapper for the platform C allocator
///
/// Zero-byte requests are rounded up to one byte so every successful acquire
/// yields a distinct, releasable address and `resize(ptr, 0)` never turns
/// into an implicit free.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl SystemAllocator {
    /// Creates a new SystemAllocator
    ///
    /// This is a zero-cost operation as the SystemAllocator contains no state.
    #[inline]
    pub const fn new() -> Self {
        SystemAllocator
    }

    #[inline]
    fn effective(size: usize) -> usize {
        size.max(1)
    }
}

// SAFETY: malloc/calloc/realloc/free satisfy the BaseAllocator contract; realloc
// leaves the original block intact when it returns null.
unsafe impl BaseAllocator for SystemAllocator {
    fn acquire(&self, size: usize) -> ScopeResult<NonNull<u8>> {
        // SAFETY: malloc has no preconditions
        let ptr = unsafe { libc::malloc(Self::effective(size)) };
        NonNull::new(ptr.cast::<u8>()).ok_or_else(|| ScopeError::out_of_memory(size))
    }

    fn acquire_zeroed(&self, size: usize) -> ScopeResult<NonNull<u8>> {
        // SAFETY: calloc has no preconditions
        let ptr = unsafe { libc::calloc(1, Self::effective(size)) };
        NonNull::new(ptr.cast::<u8>()).ok_or_else(|| ScopeError::out_of_memory(size))
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: caller guarantees `ptr` came from malloc/calloc/realloc and is live
        unsafe { libc::free(ptr.as_ptr().cast()) };
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> ScopeResult<NonNull<u8>> {
        // SAFETY: caller guarantees `ptr` is a live heap block; size is non-zero
        let new = unsafe { libc::realloc(ptr.as_ptr().cast(), Self::effective(new_size)) };
        NonNull::new(new.cast::<u8>()).ok_or_else(|| ScopeError::out_of_memory(new_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_allocation() {
        let allocator = SystemAllocator::new();
        let ptr = allocator.acquire(64).unwrap();

        unsafe {
            core::ptr::write_bytes(ptr.as_ptr(), 0xAB, 64);
            assert_eq!(*ptr.as_ptr().add(63), 0xAB);
            allocator.release(ptr);
        }
    }

    #[test]
    fn test_zeroed_allocation() {
        let allocator = SystemAllocator::new();
        let ptr = allocator.acquire_zeroed(128).unwrap();

        unsafe {
            let bytes = core::slice::from_raw_parts(ptr.as_ptr(), 128);
            assert!(bytes.iter().all(|&b| b == 0));
            allocator.release(ptr);
        }
    }

    #[test]
    fn test_zero_sized_requests_are_distinct() {
        let allocator = SystemAllocator::new();
        let a = allocator.acquire(0).unwrap();
        let b = allocator.acquire(0).unwrap();
        assert_ne!(a, b);

        unsafe {
            allocator.release(a);
            allocator.release(b);
        }
    }

    #[test]
    fn test_resize_preserves_contents() {
        let allocator = SystemAllocator::new();
        let ptr = allocator.acquire(4).unwrap();

        unsafe {
            ptr.as_ptr().cast::<u32>().write_unaligned(0x1234_5678);
            let grown = allocator.resize(ptr, 4096).unwrap();
            assert_eq!(grown.as_ptr().cast::<u32>().read_unaligned(), 0x1234_5678);

            // shrinking to zero keeps a live block
            let shrunk = allocator.resize(grown, 0).unwrap();
            allocator.release(shrunk);
        }
    }

    #[test]
    fn test_thread_safety_markers() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<SystemAllocator>();
        assert_sync::<SystemAllocator>();
    }
}
