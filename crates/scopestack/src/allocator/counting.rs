//! Counting allocator implementation
//!
//! Wraps another base allocator and counts what passes through it, so tests
//! and diagnostics can check that every acquired block is released exactly
//! once. Acquire and resize budgets turn it into a fault injector: once a
//! budget is spent, the corresponding operation fails without reaching the
//! inner allocator.
//!
//! ## Invariants
//!
//! - Every successful acquire is counted once, zeroed or not
//! - Every release is counted once, after the inner release
//! - Resizes move a block; they change neither `acquired` nor `released`
//! - Failed operations only bump `failed`

use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::BaseAllocator;
use crate::error::{ScopeError, ScopeResult};

const UNLIMITED: usize = usize::MAX;

/// Point-in-time copy of a [`CountingAllocator`]'s counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationCounts {
    /// Successful acquisitions
    pub acquired: usize,
    /// Releases
    pub released: usize,
    /// Successful resizes
    pub resized: usize,
    /// Failed acquisitions and resizes
    pub failed: usize,
}

impl AllocationCounts {
    /// Blocks acquired and not yet released
    #[must_use]
    pub fn live(&self) -> usize {
        self.acquired.saturating_sub(self.released)
    }
}

/// A wrapper allocator that counts operations and injects failures
#[derive(Debug)]
pub struct CountingAllocator<A> {
    inner: A,
    acquired: AtomicUsize,
    released: AtomicUsize,
    resized: AtomicUsize,
    failed: AtomicUsize,
    acquire_budget: AtomicUsize,
    resize_budget: AtomicUsize,
}

impl<A> CountingAllocator<A> {
    /// Wraps `inner` with zeroed counters and unlimited budgets
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            resized: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            acquire_budget: AtomicUsize::new(UNLIMITED),
            resize_budget: AtomicUsize::new(UNLIMITED),
        }
    }

    /// Gets a reference to the underlying allocator
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Current counters
    pub fn counts(&self) -> AllocationCounts {
        AllocationCounts {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            resized: self.resized.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Blocks acquired and not yet released
    pub fn live(&self) -> usize {
        self.counts().live()
    }

    /// Lets the next `budget` acquisitions through, failing the rest
    ///
    /// `None` lifts the limit.
    pub fn set_acquire_budget(&self, budget: Option<usize>) {
        self.acquire_budget
            .store(budget.unwrap_or(UNLIMITED), Ordering::Relaxed);
    }

    /// Lets the next `budget` resizes through, failing the rest
    ///
    /// `None` lifts the limit.
    pub fn set_resize_budget(&self, budget: Option<usize>) {
        self.resize_budget
            .store(budget.unwrap_or(UNLIMITED), Ordering::Relaxed);
    }

    /// Zeroes all counters, keeping budgets
    pub fn reset_counts(&self) {
        for counter in [&self.acquired, &self.released, &self.resized, &self.failed] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn take(budget: &AtomicUsize) -> bool {
        budget
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |left| match left {
                0 => None,
                UNLIMITED => Some(UNLIMITED),
                left => Some(left - 1),
            })
            .is_ok()
    }

    fn record<T>(&self, result: ScopeResult<T>, counter: &AtomicUsize) -> ScopeResult<T> {
        match &result {
            Ok(_) => counter.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        result
    }
}

impl<A: Default> Default for CountingAllocator<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

// SAFETY: forwards to the inner allocator; injected failures never touch the
// block, which satisfies the "failed resize leaves the block intact" clause.
unsafe impl<A: BaseAllocator> BaseAllocator for CountingAllocator<A> {
    fn acquire(&self, size: usize) -> ScopeResult<NonNull<u8>> {
        let result = if Self::take(&self.acquire_budget) {
            self.inner.acquire(size)
        } else {
            Err(ScopeError::out_of_memory(size))
        };
        self.record(result, &self.acquired)
    }

    fn acquire_zeroed(&self, size: usize) -> ScopeResult<NonNull<u8>> {
        let result = if Self::take(&self.acquire_budget) {
            self.inner.acquire_zeroed(size)
        } else {
            Err(ScopeError::out_of_memory(size))
        };
        self.record(result, &self.acquired)
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded under the caller's contract
        unsafe { self.inner.release(ptr) };
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> ScopeResult<NonNull<u8>> {
        let result = if Self::take(&self.resize_budget) {
            // SAFETY: forwarded under the caller's contract
            unsafe { self.inner.resize(ptr, new_size) }
        } else {
            Err(ScopeError::out_of_memory(new_size))
        };
        self.record(result, &self.resized)
    }
}
