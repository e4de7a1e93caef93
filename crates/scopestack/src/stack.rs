//! The stack of frames
//!
//! A [`ScopeStack`] is strictly LIFO: frames are pushed at scope entry and
//! popped, releasing whatever they still own, at scope exit. [`FrameGuard`]
//! ties the pop to Rust scope exit so it runs on early returns, `?` and
//! unwinding alike.
//!
//! A stack is confined to the thread that created it (`!Send`, `!Sync`).
//! Interior mutability is `RefCell`-based and no borrow is held while the base
//! allocator runs, so an allocator may look at the stack it serves.

use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use core::ptr::NonNull;

use tracing::{debug, warn};

use crate::allocator::{BaseAllocator, SystemAllocator};
use crate::config::StackConfig;
use crate::diagnostics::{FrameSnapshot, StackSnapshot};
use crate::error::{ScopeError, ScopeResult};
use crate::frame::{Frame, FrameId, FrameInfo};
use crate::set::{Address, ArraySet, FrameKind, FrameSet, OwnershipSet};
use crate::stats::{StackStats, StatsRecorder};

/// A thread-confined stack of ownership frames over a base allocator
pub struct ScopeStack<A: BaseAllocator = SystemAllocator> {
    pub(crate) frames: RefCell<Vec<Frame>>,
    pub(crate) allocator: A,
    pub(crate) stats: StatsRecorder,
    config: StackConfig,
    next_id: Cell<u64>,
    /// Pins the stack to its thread
    _local: PhantomData<*const ()>,
}

impl<A: BaseAllocator> ScopeStack<A> {
    /// Creates an empty stack with the default configuration
    pub fn new(allocator: A) -> Self {
        Self::build(allocator, StackConfig::default())
    }

    /// Creates an empty stack after validating `config`
    pub fn with_config(allocator: A, config: StackConfig) -> ScopeResult<Self> {
        config.validate()?;
        Ok(Self::build(allocator, config))
    }

    fn build(allocator: A, config: StackConfig) -> Self {
        Self {
            frames: RefCell::new(Vec::new()),
            allocator,
            stats: StatsRecorder::new(config.track_stats),
            config,
            next_id: Cell::new(1),
            _local: PhantomData,
        }
    }

    /// The base allocator
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// The configuration this stack was built with
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Number of live frames
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// True if no frame is active (passthrough mode)
    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }

    /// Counter snapshot
    pub fn stats(&self) -> StackStats {
        self.stats.snapshot()
    }

    /// Zeroes all counters
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    // ------------------------------------------------------------------------
    // Frame protocol
    // ------------------------------------------------------------------------

    /// Pushes a frame and returns the guard that pops it
    ///
    /// Never fails: an array frame whose slot table cannot be allocated is
    /// pushed with no slots, so every allocation in it reports
    /// `CapacityExceeded`. Use [`try_push_frame`](Self::try_push_frame) to
    /// see the failure instead.
    pub fn push_frame(&self, kind: FrameKind) -> FrameGuard<'_, A> {
        let id = self.enter_frame(kind);
        self.guard(id)
    }

    /// Pushes a frame, failing if its ownership set cannot be allocated
    ///
    /// On failure the stack is left unchanged.
    pub fn try_push_frame(&self, kind: FrameKind) -> ScopeResult<FrameGuard<'_, A>> {
        let id = self.try_enter_frame(kind)?;
        Ok(self.guard(id))
    }

    fn guard(&self, id: FrameId) -> FrameGuard<'_, A> {
        FrameGuard {
            stack: self,
            id,
            active: true,
        }
    }

    /// Pushes a frame of the configured default kind
    pub fn push_default_frame(&self) -> FrameGuard<'_, A> {
        self.push_frame(self.config.default_kind)
    }

    /// Pushes a frame without a guard
    ///
    /// The caller must bracket it with [`pop_frame`](Self::pop_frame); frames
    /// still on the stack when it is dropped are popped then. Falls back to a
    /// slotless array frame like [`push_frame`](Self::push_frame).
    pub fn enter_frame(&self, kind: FrameKind) -> FrameId {
        let set = FrameSet::new(kind, self.config.tree_node_limit).unwrap_or_else(|err| {
            warn!(%kind, %err, "frame set unavailable; pushing a frame that owns nothing");
            FrameSet::Array(ArraySet::empty())
        });
        self.push_set(set)
    }

    /// Pushes a frame without a guard, failing if its ownership set cannot
    /// be allocated
    pub fn try_enter_frame(&self, kind: FrameKind) -> ScopeResult<FrameId> {
        let set = FrameSet::new(kind, self.config.tree_node_limit)?;
        Ok(self.push_set(set))
    }

    fn push_set(&self, set: FrameSet) -> FrameId {
        let id = FrameId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let kind = set.kind();

        let depth = {
            let mut frames = self.frames.borrow_mut();
            let parent = frames.last().map(Frame::id);
            let depth = frames.len();
            frames.push(Frame::new(id, parent, depth, set));
            depth
        };

        self.stats.record(|s| {
            s.frames_pushed += 1;
            s.peak_depth = s.peak_depth.max(depth + 1);
        });
        debug!(frame = %id, depth, %kind, "frame pushed");
        id
    }

    /// Pops the current frame, releasing everything it still owns
    pub fn pop_frame(&self) -> ScopeResult<()> {
        let frame = self.frames.borrow_mut().pop().ok_or(ScopeError::NoActiveFrame)?;
        self.destroy(frame);
        Ok(())
    }

    /// Pops frames down to and including `id`
    ///
    /// Frames above `id` belong to guards that were leaked or to unbalanced
    /// `enter_frame` calls; they are popped first so frames still leave the
    /// stack top-down. Returns `NoActiveFrame` if `id` is no longer on the
    /// stack.
    pub(crate) fn pop_through(&self, id: FrameId) -> ScopeResult<()> {
        let position = self
            .frames
            .borrow()
            .iter()
            .rposition(|frame| frame.id() == id)
            .ok_or(ScopeError::NoActiveFrame)?;

        loop {
            let frame = self.frames.borrow_mut().pop().ok_or(ScopeError::NoActiveFrame)?;
            let reached = frame.id() == id;
            if !reached {
                warn!(frame = %frame.id(), below = %id, "popping frame left open above its parent's guard");
            }
            self.destroy(frame);
            if reached {
                return Ok(());
            }
            debug_assert!(self.depth() > position);
        }
    }

    fn destroy(&self, mut frame: Frame) {
        let released = frame.len();
        frame.set_mut().destroy_all(&mut |addr: Address| {
            // SAFETY: a frame only holds blocks acquired from this allocator or
            // adopted under `adopt`'s contract, and each is held exactly once
            unsafe { self.allocator.release(addr.as_non_null()) };
        });

        self.stats.record(|s| {
            s.frames_popped += 1;
            s.exit_releases += released as u64;
        });
        debug!(frame = %frame.id(), depth = frame.depth(), released, "frame popped");
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Summary of the current frame
    pub fn current(&self) -> ScopeResult<FrameInfo> {
        self.frames
            .borrow()
            .last()
            .map(Frame::info)
            .ok_or(ScopeError::NoActiveFrame)
    }

    /// Summaries of every frame, bottom first
    pub fn frames(&self) -> Vec<FrameInfo> {
        self.frames.borrow().iter().map(Frame::info).collect()
    }

    /// True if the current frame owns `ptr`
    pub fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.frames
            .borrow()
            .last()
            .is_some_and(|frame| frame.owns(Address::new(ptr)))
    }

    /// The frame owning `ptr`, searching the whole stack
    pub fn owner_of(&self, ptr: NonNull<u8>) -> Option<FrameId> {
        let addr = Address::new(ptr);
        self.frames
            .borrow()
            .iter()
            .rev()
            .find(|frame| frame.owns(addr))
            .map(Frame::id)
    }

    /// Full picture of every frame and what it owns, bottom first
    pub fn snapshot(&self) -> StackSnapshot {
        StackSnapshot {
            frames: self
                .frames
                .borrow()
                .iter()
                .map(|frame| FrameSnapshot {
                    id: frame.id(),
                    parent: frame.parent(),
                    depth: frame.depth(),
                    kind: frame.kind(),
                    addresses: frame.set().addresses(),
                })
                .collect(),
        }
    }

    /// Human-readable dump of every frame
    pub fn dump(&self) -> String {
        self.snapshot().to_string()
    }

    /// Runs `f` on the current frame; `None` in passthrough mode
    pub(crate) fn with_current_mut<R>(&self, f: impl FnOnce(&mut Frame) -> R) -> Option<R> {
        self.frames.borrow_mut().last_mut().map(f)
    }
}

impl<A: BaseAllocator + Default> Default for ScopeStack<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A: BaseAllocator> Drop for ScopeStack<A> {
    fn drop(&mut self) {
        while self.pop_frame().is_ok() {}
    }
}

impl<A: BaseAllocator> core::fmt::Debug for ScopeStack<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopeStack")
            .field("frames", &self.frames())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// RAII handle for a pushed frame
///
/// Dropping the guard pops its frame (and any frame left open above it),
/// releasing every address the frame still owns.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard<'s, A: BaseAllocator = SystemAllocator> {
    stack: &'s ScopeStack<A>,
    id: FrameId,
    active: bool,
}

impl<'s, A: BaseAllocator> FrameGuard<'s, A> {
    /// Id of the guarded frame
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// The stack this frame lives on
    pub fn stack(&self) -> &'s ScopeStack<A> {
        self.stack
    }

    /// Pops the frame now instead of at drop
    ///
    /// Fails with `NoActiveFrame` if the frame was already popped through
    /// [`ScopeStack::pop_frame`].
    pub fn pop(mut self) -> ScopeResult<()> {
        self.active = false;
        self.stack.pop_through(self.id)
    }
}

impl<A: BaseAllocator> Drop for FrameGuard<'_, A> {
    fn drop(&mut self) {
        if self.active {
            // fails only if the frame was already popped by hand
            let _ = self.stack.pop_through(self.id);
        }
    }
}

impl<A: BaseAllocator> core::fmt::Debug for FrameGuard<'_, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameGuard")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
