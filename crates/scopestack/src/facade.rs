//! Allocation facade
//!
//! Every operation acts on the stack's current frame. With no frame active,
//! allocation passes straight through to the base allocator untracked; every
//! other operation fails with `NoActiveFrame`, except `release`, which never
//! frees memory it cannot prove the current frame owns.
//!
//! Per-allocation lifecycle:
//!
//! ```text
//! Unowned --allocate/adopt--> Owned(F) --promote--> Owned(parent of F)
//!                                |                        |
//!                                +--release / pop F--> Released <--+
//! ```
//!
//! No transition creates a second owner, and a released address is never
//! acted upon again because it is no longer in any set.

use core::ptr::NonNull;

use tracing::{debug, error, trace};

use crate::allocator::{BaseAllocator, array_size};
use crate::error::{ScopeError, ScopeResult};
use crate::set::{Address, OwnershipSet};
use crate::stack::ScopeStack;

impl<A: BaseAllocator> ScopeStack<A> {
    /// Allocates `size` bytes owned by the current frame
    ///
    /// Without a frame the block is handed out untracked and the caller must
    /// free it through the base allocator. If the frame cannot record the
    /// block it is released again before the tracking failure is returned.
    pub fn allocate(&self, size: usize) -> ScopeResult<NonNull<u8>> {
        let ptr = self.allocator.acquire(size)?;
        self.track_new(ptr, size)
    }

    /// Allocates `count * size` zeroed bytes owned by the current frame
    ///
    /// Multiplication overflow is an out-of-memory error.
    pub fn allocate_zeroed(&self, count: usize, size: usize) -> ScopeResult<NonNull<u8>> {
        let total = array_size(count, size)?;
        let ptr = self.allocator.acquire_zeroed(total)?;
        self.track_new(ptr, total)
    }

    fn track_new(&self, ptr: NonNull<u8>, size: usize) -> ScopeResult<NonNull<u8>> {
        let addr = Address::new(ptr);
        let tracked = self.with_current_mut(|frame| {
            frame.set_mut().insert(addr).map(|()| (frame.id(), frame.depth()))
        });

        match tracked {
            Some(Ok((frame, depth))) => {
                self.stats.record(|s| s.tracked_allocations += 1);
                trace!(%addr, size, %frame, depth, "allocation tracked");
                Ok(ptr)
            }
            Some(Err(err)) => {
                // SAFETY: just acquired from this allocator and never handed out
                unsafe { self.allocator.release(ptr) };
                self.stats.record(|s| s.tracking_failures += 1);
                Err(err)
            }
            None => {
                self.stats.record(|s| s.passthrough_allocations += 1);
                debug!(%addr, size, "no active frame; allocation is untracked");
                Ok(ptr)
            }
        }
    }

    /// Frees `ptr` if the current frame owns it
    ///
    /// Addresses owned by another frame, or by nobody, are left alone: a
    /// scope cannot free what an enclosing scope is responsible for.
    pub fn release(&self, ptr: NonNull<u8>) {
        let addr = Address::new(ptr);
        let removed = self.with_current_mut(|frame| {
            frame.set_mut().remove(addr).then(|| (frame.id(), frame.depth()))
        });
        match removed {
            Some(Some((frame, depth))) => {
                // SAFETY: the current frame owned `addr`, so it is live and ours
                unsafe { self.allocator.release(ptr) };
                self.stats.record(|s| s.releases += 1);
                trace!(%addr, %frame, depth, "released");
            }
            Some(None) => debug!(%addr, "release ignored: not owned by the current frame"),
            None => debug!(%addr, "release ignored: no active frame"),
        }
    }

    /// Resizes a block owned by the current frame
    ///
    /// The returned address replaces `ptr` in the frame. On failure:
    /// - `NotOwned`: `ptr` was untouched
    /// - `OutOfMemory` or `SizeOverflow`: `ptr` is still valid and still owned
    /// - `TrackingFailure`: the resized block could not be recorded and was
    ///   released; `ptr` is invalid
    /// - `ReallocLost`: resizing failed and `ptr` could not be re-recorded, so
    ///   it was released
    pub fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> ScopeResult<NonNull<u8>> {
        self.resize_to(ptr, || Ok(new_size))
    }

    /// Resizes a block to `count * size` bytes; see [`resize`](Self::resize)
    pub fn resize_array(&self, ptr: NonNull<u8>, count: usize, size: usize) -> ScopeResult<NonNull<u8>> {
        self.resize_to(ptr, || array_size(count, size))
    }

    fn resize_to(
        &self,
        ptr: NonNull<u8>,
        new_size: impl FnOnce() -> ScopeResult<usize>,
    ) -> ScopeResult<NonNull<u8>> {
        let old = Address::new(ptr);

        // 1. take the old record out; the frame must own it
        let (frame, depth) = match self.with_current_mut(|frame| {
            frame.set_mut().remove(old).then(|| (frame.id(), frame.depth()))
        }) {
            None => return Err(ScopeError::NoActiveFrame),
            Some(None) => return Err(ScopeError::not_owned(old)),
            Some(Some(owner)) => owner,
        };

        let requested = new_size();
        let resized = requested.clone().and_then(|size| {
            // SAFETY: `ptr` was owned by the current frame, hence live and ours
            unsafe { self.allocator.resize(ptr, size) }
        });

        match resized {
            // 2. record the new block
            Ok(new_ptr) => {
                let new = Address::new(new_ptr);
                let inserted = self
                    .with_current_mut(|frame| frame.set_mut().insert(new))
                    .unwrap_or(Err(ScopeError::NoActiveFrame));
                match inserted {
                    Ok(()) => {
                        self.stats.record(|s| s.resizes += 1);
                        trace!(from = %old, to = %new, %frame, depth, "resized");
                        Ok(new_ptr)
                    }
                    Err(err) => {
                        // SAFETY: the resized block is live and nobody else knows it
                        unsafe { self.allocator.release(new_ptr) };
                        self.stats.record(|s| s.tracking_failures += 1);
                        Err(err)
                    }
                }
            }
            // 3. put the old block back where it was
            Err(err) => match self.with_current_mut(|frame| frame.set_mut().insert(old)) {
                Some(Ok(())) => Err(err),
                _ => {
                    // SAFETY: `ptr` survived the failed resize and is untracked
                    unsafe { self.allocator.release(ptr) };
                    self.stats.record(|s| s.tracking_failures += 1);
                    Err(ScopeError::realloc_lost(old, requested.unwrap_or(usize::MAX)))
                }
            },
        }
    }

    /// Records an externally obtained block as owned by the current frame
    ///
    /// The block will be freed through this stack's base allocator when the
    /// frame pops. Addresses already owned by any frame of this stack are
    /// rejected so no block ever has two owners.
    ///
    /// # Safety
    /// `ptr` must be a live block from this stack's base allocator (or one it
    /// can release), and nothing else may free it while it is tracked.
    pub unsafe fn adopt(&self, ptr: NonNull<u8>) -> ScopeResult<()> {
        let addr = Address::new(ptr);
        let result = {
            let mut frames = self.frames.borrow_mut();
            if frames.is_empty() {
                return Err(ScopeError::NoActiveFrame);
            }
            if frames.iter().any(|frame| frame.owns(addr)) {
                Err(ScopeError::already_tracked(addr))
            } else {
                frames
                    .last_mut()
                    .ok_or(ScopeError::NoActiveFrame)
                    .and_then(|frame| frame.set_mut().insert(addr).map(|()| (frame.id(), frame.depth())))
            }
        };

        match result {
            Ok((frame, depth)) => {
                self.stats.record(|s| s.adoptions += 1);
                trace!(%addr, %frame, depth, "adopted");
                Ok(())
            }
            Err(err) => {
                self.stats.record(|s| s.tracking_failures += 1);
                Err(err)
            }
        }
    }

    /// Moves ownership of `ptr` from the current frame to its parent
    ///
    /// From the bottom frame the address simply becomes untracked and the
    /// caller is responsible for freeing it. The insert goes through the
    /// parent's own ownership set; if the parent refuses it the address is
    /// returned to the current frame and the tracking failure reported.
    pub fn promote(&self, ptr: NonNull<u8>) -> ScopeResult<()> {
        let addr = Address::new(ptr);
        let mut frames = self.frames.borrow_mut();
        let Some((current, ancestors)) = frames.split_last_mut() else {
            return Err(ScopeError::NoActiveFrame);
        };

        if !current.set_mut().remove(addr) {
            return Err(ScopeError::not_owned(addr));
        }

        let Some(parent) = ancestors.last_mut() else {
            self.stats.record(|s| s.promotions += 1);
            debug!(%addr, from = %current.id(), "promoted out of the bottom frame; address is now untracked");
            return Ok(());
        };

        match parent.set_mut().insert(addr) {
            Ok(()) => {
                self.stats.record(|s| s.promotions += 1);
                trace!(%addr, from = %current.id(), to = %parent.id(), depth = parent.depth(), "promoted");
                Ok(())
            }
            Err(err) => {
                if current.set_mut().insert(addr).is_err() {
                    error!(%addr, frame = %current.id(), "promotion rollback failed; address is untracked");
                }
                self.stats.record(|s| s.tracking_failures += 1);
                Err(err)
            }
        }
    }
}
