//! Stack dumps
//!
//! A [`StackSnapshot`] is an owned copy of every frame and the addresses it
//! owns, taken bottom frame first. Its `Display` form is what
//! [`ScopeStack::dump`](crate::ScopeStack::dump) returns:
//!
//! ```text
//! ---- #1 tree depth=0 owned=1
//!   0x5581e2a0
//! ---- #2 array[4] depth=1 owned=0
//! ----
//! ```

use core::fmt;

use crate::frame::FrameId;
use crate::set::{Address, FrameKind};

/// One frame as seen at snapshot time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    /// Frame id
    pub id: FrameId,
    /// Enclosing frame id
    pub parent: Option<FrameId>,
    /// Stack position, 0 at the bottom
    pub depth: usize,
    /// Ownership set kind
    pub kind: FrameKind,
    /// Owned addresses; ascending for tree frames, slot order for arrays
    pub addresses: Vec<Address>,
}

impl fmt::Display for FrameSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "---- {} {} depth={} owned={}",
            self.id,
            self.kind,
            self.depth,
            self.addresses.len()
        )?;
        for addr in &self.addresses {
            writeln!(f, "  {addr}")?;
        }
        Ok(())
    }
}

/// Every frame of a stack, bottom first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackSnapshot {
    /// Frames, bottom first
    pub frames: Vec<FrameSnapshot>,
}

impl StackSnapshot {
    /// Number of frames
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Addresses owned across all frames
    #[must_use]
    pub fn total_owned(&self) -> usize {
        self.frames.iter().map(|frame| frame.addresses.len()).sum()
    }

    /// The frame owning `addr`, if any
    #[must_use]
    pub fn owner_of(&self, addr: Address) -> Option<FrameId> {
        self.frames
            .iter()
            .find(|frame| frame.addresses.contains(&addr))
            .map(|frame| frame.id)
    }
}

impl fmt::Display for StackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            write!(f, "{frame}")?;
        }
        writeln!(f, "----")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::set::testing::addr;

    fn sample() -> StackSnapshot {
        StackSnapshot {
            frames: vec![
                FrameSnapshot {
                    id: FrameId(1),
                    parent: None,
                    depth: 0,
                    kind: FrameKind::Tree,
                    addresses: vec![addr(0x1000), addr(0x2000)],
                },
                FrameSnapshot {
                    id: FrameId(2),
                    parent: Some(FrameId(1)),
                    depth: 1,
                    kind: FrameKind::array(4),
                    addresses: vec![],
                },
            ],
        }
    }

    #[test]
    fn renders_frames_bottom_first() {
        let expected = "\
---- #1 tree depth=0 owned=2
  0x1000
  0x2000
---- #2 array[4] depth=1 owned=0
----
";
        assert_eq!(sample().to_string(), expected);
    }

    #[test]
    fn empty_stack_renders_terminator_only() {
        assert_eq!(StackSnapshot::default().to_string(), "----\n");
    }

    #[test]
    fn queries() {
        let snapshot = sample();
        assert_eq!(snapshot.depth(), 2);
        assert_eq!(snapshot.total_owned(), 2);
        assert_eq!(snapshot.owner_of(addr(0x2000)), Some(FrameId(1)));
        assert_eq!(snapshot.owner_of(addr(0x3000)), None);
    }
}
