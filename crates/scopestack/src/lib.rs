//! # scopestack
//!
//! Scope-bound ownership tracking for heap allocations.
//!
//! Code opens a *frame* when it enters a lexical scope; every block allocated
//! through the stack while that frame is current is owned by it, and popping
//! the frame releases everything it still owns. Results that must outlive the
//! scope are *promoted* to the enclosing frame, and blocks obtained elsewhere
//! can be *adopted*.
//!
//! ## Quick Start
//!
//! ```rust
//! use scopestack::prelude::*;
//!
//! fn xor42(stack: &ScopeStack, input: &[u8]) -> ScopeResult<NonNull<u8>> {
//!     let _frame = stack.push_frame(FrameKind::Tree);
//!
//!     let out = stack.allocate(input.len())?;
//!     for (i, byte) in input.iter().enumerate() {
//!         unsafe { out.as_ptr().add(i).write(byte ^ 42) };
//!     }
//!
//!     // hand the result to the caller's frame
//!     stack.promote(out)?;
//!     Ok(out)
//! }
//!
//! let stack = ScopeStack::new(SystemAllocator::new());
//! let _frame = stack.push_frame(FrameKind::Tree);
//! let out = xor42(&stack, b"abc")?;
//! assert!(stack.owns(out));
//! # Ok::<(), ScopeError>(())
//! ```
//!
//! ## Frames
//!
//! Each frame keeps its addresses in one of two ownership sets:
//! - `FrameKind::Tree`: unbounded balanced tree, one bookkeeping node per
//!   address
//! - `FrameKind::Array { capacity }`: fixed slot array, no allocation after
//!   the frame is created
//!
//! ## Features
//!
//! - `stats` (default): per-stack counters, see [`StackStats`]
//!
//! ## Architecture
//!
//! - [`ScopeStack`] owns the frames and a [`BaseAllocator`]; it is confined to
//!   one thread
//! - [`local`] keeps one stack per thread behind free functions and the
//!   [`scope!`] macro
//! - Errors are [`ScopeError`] values; nothing in the crate panics on
//!   allocation failure

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::all)]
#![warn(clippy::perf)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
// Raw allocation and pointer bookkeeping is the point of this crate
#![allow(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Explicit lifetimes are clearer on guard types even when elidable
#![allow(clippy::elidable_lifetime_names)]
#![allow(clippy::double_must_use)]
#![allow(clippy::return_self_not_must_use)]

// Error types
pub mod error;

// Core modules
pub mod allocator;
pub mod config;
pub mod diagnostics;
mod facade;
pub mod frame;
pub mod local;
pub mod set;
pub mod stack;
pub mod stats;

#[macro_use]
mod macros;

pub use crate::allocator::{AllocationCounts, BaseAllocator, CountingAllocator, SystemAllocator};
pub use crate::config::StackConfig;
pub use crate::diagnostics::{FrameSnapshot, StackSnapshot};
pub use crate::error::{ScopeError, ScopeResult, TrackingFailureReason};
pub use crate::frame::{Frame, FrameId, FrameInfo};
pub use crate::local::LocalFrameGuard;
pub use crate::set::{Address, ArraySet, FrameKind, FrameSet, OwnershipSet, TreeSet};
pub use crate::stack::{FrameGuard, ScopeStack};
pub use crate::stats::StackStats;

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use core::ptr::NonNull;

    pub use crate::allocator::{BaseAllocator, SystemAllocator};
    pub use crate::config::StackConfig;
    pub use crate::error::{ScopeError, ScopeResult};
    pub use crate::frame::FrameId;
    pub use crate::local;
    pub use crate::set::{Address, FrameKind};
    pub use crate::stack::{FrameGuard, ScopeStack};
    pub use crate::{scope, scoped};
}
