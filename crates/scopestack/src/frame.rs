//! Frames: one scope's ownership record

use core::fmt;

use crate::set::{Address, FrameKind, FrameSet, OwnershipSet};

/// Identifier of a frame, unique within its stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub(crate) u64);

impl FrameId {
    /// Raw identifier value
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bookkeeping for one nested scope
///
/// The parent is referred to by id only; the stack owns every frame and a
/// frame never keeps its parent alive.
#[derive(Debug)]
pub struct Frame {
    id: FrameId,
    parent: Option<FrameId>,
    depth: usize,
    set: FrameSet,
}

impl Frame {
    pub(crate) fn new(id: FrameId, parent: Option<FrameId>, depth: usize, set: FrameSet) -> Self {
        Self { id, parent, depth, set }
    }

    /// This frame's id
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Enclosing frame, if any
    #[must_use]
    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    /// Position on the stack, 0 for the bottom frame
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Kind of ownership set this frame uses
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.set.kind()
    }

    /// Number of owned addresses
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// True if the frame owns nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// True if the frame owns `addr`
    #[must_use]
    pub fn owns(&self, addr: Address) -> bool {
        self.set.contains(addr)
    }

    /// Read access to the ownership set
    #[must_use]
    pub fn set(&self) -> &FrameSet {
        &self.set
    }

    pub(crate) fn set_mut(&mut self) -> &mut FrameSet {
        &mut self.set
    }

    /// Summary without the owned addresses
    #[must_use]
    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            id: self.id,
            parent: self.parent,
            depth: self.depth,
            kind: self.kind(),
            len: self.len(),
        }
    }
}

/// Copyable summary of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frame id
    pub id: FrameId,
    /// Enclosing frame id
    pub parent: Option<FrameId>,
    /// Stack position, 0 at the bottom
    pub depth: usize,
    /// Ownership set kind
    pub kind: FrameKind,
    /// Owned address count
    pub len: usize,
}
