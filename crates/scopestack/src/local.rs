//! Thread-local stack
//!
//! Every thread gets its own [`ScopeStack`] over the [`SystemAllocator`],
//! created on first use and torn down with the thread. The free functions in
//! this module are the ambient facade: they act on the calling thread's stack
//! so code can allocate scope-owned memory without threading a stack
//! reference through every call.
//!
//! ```
//! use scopestack::{FrameKind, local};
//!
//! fn shout(text: &str) -> scopestack::ScopeResult<usize> {
//!     let _frame = local::scope(FrameKind::Tree);
//!     let buf = local::allocate(text.len())?;
//!     // ... work with `buf` ...
//!     # let _ = buf;
//!     Ok(local::depth())
//! } // everything allocated above is released here
//!
//! assert_eq!(shout("hi").unwrap(), 1);
//! assert_eq!(local::depth(), 0);
//! ```

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::allocator::SystemAllocator;
use crate::error::ScopeResult;
use crate::frame::FrameId;
use crate::set::FrameKind;
use crate::stack::ScopeStack;
use crate::stats::StackStats;

thread_local! {
    static LOCAL_STACK: ScopeStack<SystemAllocator> = ScopeStack::new(SystemAllocator::new());
}

/// Runs `f` with the calling thread's stack
pub fn with_local_stack<F, R>(f: F) -> R
where
    F: FnOnce(&ScopeStack<SystemAllocator>) -> R,
{
    LOCAL_STACK.with(f)
}

/// Guard for a frame on the thread-local stack
///
/// Pops the frame (and anything left open above it) when dropped. Like the
/// stack itself it cannot leave its thread.
#[must_use = "the frame is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LocalFrameGuard {
    id: FrameId,
    active: bool,
    _local: PhantomData<*const ()>,
}

impl LocalFrameGuard {
    /// Id of the guarded frame
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Pops the frame now instead of at drop
    pub fn pop(mut self) -> ScopeResult<()> {
        self.active = false;
        with_local_stack(|stack| stack.pop_through(self.id))
    }
}

impl Drop for LocalFrameGuard {
    fn drop(&mut self) {
        if self.active {
            // the stack may already be gone during thread teardown; its own
            // drop has released everything in that case
            let _ = LOCAL_STACK.try_with(|stack| stack.pop_through(self.id));
        }
    }
}

/// Opens a frame of `kind` on this thread's stack
pub fn scope(kind: FrameKind) -> LocalFrameGuard {
    LocalFrameGuard {
        id: enter_frame(kind),
        active: true,
        _local: PhantomData,
    }
}

/// Opens a frame of `kind`, failing if its ownership set cannot be allocated
pub fn try_scope(kind: FrameKind) -> ScopeResult<LocalFrameGuard> {
    Ok(LocalFrameGuard {
        id: try_enter_frame(kind)?,
        active: true,
        _local: PhantomData,
    })
}

/// Opens a frame of the stack's default kind
pub fn default_scope() -> LocalFrameGuard {
    scope(with_local_stack(|stack| stack.config().default_kind))
}

/// Pushes a frame without a guard; see [`ScopeStack::enter_frame`]
pub fn enter_frame(kind: FrameKind) -> FrameId {
    with_local_stack(|stack| stack.enter_frame(kind))
}

/// See [`ScopeStack::try_enter_frame`]
pub fn try_enter_frame(kind: FrameKind) -> ScopeResult<FrameId> {
    with_local_stack(|stack| stack.try_enter_frame(kind))
}

/// Pops the current frame; see [`ScopeStack::pop_frame`]
pub fn pop_frame() -> ScopeResult<()> {
    with_local_stack(ScopeStack::pop_frame)
}

/// See [`ScopeStack::allocate`]
pub fn allocate(size: usize) -> ScopeResult<NonNull<u8>> {
    with_local_stack(|stack| stack.allocate(size))
}

/// See [`ScopeStack::allocate_zeroed`]
pub fn allocate_zeroed(count: usize, size: usize) -> ScopeResult<NonNull<u8>> {
    with_local_stack(|stack| stack.allocate_zeroed(count, size))
}

/// See [`ScopeStack::resize`]
pub fn resize(ptr: NonNull<u8>, new_size: usize) -> ScopeResult<NonNull<u8>> {
    with_local_stack(|stack| stack.resize(ptr, new_size))
}

/// See [`ScopeStack::resize_array`]
pub fn resize_array(ptr: NonNull<u8>, count: usize, size: usize) -> ScopeResult<NonNull<u8>> {
    with_local_stack(|stack| stack.resize_array(ptr, count, size))
}

/// See [`ScopeStack::release`]
pub fn release(ptr: NonNull<u8>) {
    with_local_stack(|stack| stack.release(ptr));
}

/// See [`ScopeStack::adopt`]
///
/// # Safety
/// `ptr` must be a live block obtained from the system allocator
/// (`malloc`/`calloc`/`realloc`), and nothing else may free it while it is
/// tracked.
pub unsafe fn adopt(ptr: NonNull<u8>) -> ScopeResult<()> {
    // SAFETY: forwarded to the caller
    with_local_stack(|stack| unsafe { stack.adopt(ptr) })
}

/// See [`ScopeStack::promote`]
pub fn promote(ptr: NonNull<u8>) -> ScopeResult<()> {
    with_local_stack(|stack| stack.promote(ptr))
}

/// Number of frames on this thread's stack
pub fn depth() -> usize {
    with_local_stack(ScopeStack::depth)
}

/// Dump of this thread's stack
pub fn dump() -> String {
    with_local_stack(ScopeStack::dump)
}

/// Counters of this thread's stack
pub fn stats() -> StackStats {
    with_local_stack(ScopeStack::stats)
}
