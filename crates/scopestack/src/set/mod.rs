//! Ownership sets: the searchable record of which addresses a frame owns
//!
//! Two interchangeable implementations sit behind the [`OwnershipSet`] trait:
//! - [`TreeSet`]: unbounded, ordered by address, one bookkeeping node per
//!   address, height balanced so lookups stay logarithmic even when the heap
//!   hands out monotonically increasing addresses
//! - [`ArraySet`]: fixed capacity chosen when the frame is created, slot-scan
//!   based, never allocates after construction
//!
//! [`FrameSet`] is the closed enum a frame actually stores; it dispatches on
//! its own variant, never on anything the caller passes in.

mod array;
mod tree;

use core::fmt;
use core::ptr::NonNull;

pub use self::array::ArraySet;
pub use self::tree::TreeSet;
use crate::error::ScopeResult;

/// Address of a tracked allocation
///
/// Ordered and compared by numeric value. The tracker never reads or writes
/// through it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(NonNull<u8>);

impl Address {
    /// Wraps a non-null pointer
    #[inline]
    pub const fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    /// Wraps a raw pointer, returning `None` for null
    #[inline]
    pub fn from_ptr(ptr: *mut u8) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// The pointer this address names
    #[inline]
    pub const fn as_non_null(self) -> NonNull<u8> {
        self.0
    }

    /// The raw pointer this address names
    #[inline]
    pub const fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// Numeric value of the address
    #[inline]
    pub fn get(self) -> usize {
        self.0.as_ptr() as usize
    }
}

// SAFETY: an `Address` is only ever compared, ordered and printed; nothing
// dereferences it, so moving or sharing the value across threads is harmless.
// Errors and snapshots carrying addresses can then cross threads.
unsafe impl Send for Address {}
unsafe impl Sync for Address {}

impl From<NonNull<u8>> for Address {
    #[inline]
    fn from(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }
}

impl From<Address> for NonNull<u8> {
    #[inline]
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.get())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.get())
    }
}

/// Common contract of both ownership set variants
///
/// Implementations must keep every address at most once and must leave their
/// contents untouched when `insert` fails.
pub trait OwnershipSet {
    /// Records `addr` as owned
    ///
    /// Fails with a tracking failure when bookkeeping space runs out or the
    /// address is already present.
    fn insert(&mut self, addr: Address) -> ScopeResult<()>;

    /// Forgets `addr`, returning whether it was present
    fn remove(&mut self, addr: Address) -> bool;

    /// Membership test
    fn contains(&self, addr: Address) -> bool;

    /// Number of owned addresses
    fn len(&self) -> usize;

    /// True if nothing is owned
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hands every owned address to `release` exactly once and empties the set
    fn destroy_all(&mut self, release: &mut dyn FnMut(Address));

    /// Owned addresses in the set's natural order
    fn addresses(&self) -> Vec<Address>;
}

/// Which ownership set a frame uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameKind {
    /// Unbounded ordered tree
    #[default]
    Tree,
    /// Fixed-capacity slot array
    Array {
        /// Maximum number of addresses the frame may own
        capacity: usize,
    },
}

impl FrameKind {
    /// Array frame with the given capacity
    #[must_use]
    pub const fn array(capacity: usize) -> Self {
        Self::Array { capacity }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree => write!(f, "tree"),
            Self::Array { capacity } => write!(f, "array[{capacity}]"),
        }
    }
}

/// The ownership set stored in a frame
#[derive(Debug)]
pub enum FrameSet {
    /// Tree-backed set
    Tree(TreeSet),
    /// Array-backed set
    Array(ArraySet),
}

impl FrameSet {
    /// Builds an empty set of the requested kind
    ///
    /// `tree_node_limit` caps the bookkeeping nodes of a tree set and is
    /// ignored for arrays. Only an array set can fail here, when its slot
    /// table cannot be allocated.
    pub fn new(kind: FrameKind, tree_node_limit: Option<usize>) -> ScopeResult<Self> {
        Ok(match kind {
            FrameKind::Tree => Self::Tree(match tree_node_limit {
                Some(limit) => TreeSet::with_node_limit(limit),
                None => TreeSet::new(),
            }),
            FrameKind::Array { capacity } => Self::Array(ArraySet::try_with_capacity(capacity)?),
        })
    }

    /// The kind this set was built as
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Tree(_) => FrameKind::Tree,
            Self::Array(array) => FrameKind::Array {
                capacity: array.capacity(),
            },
        }
    }

    fn as_dyn(&self) -> &dyn OwnershipSet {
        match self {
            Self::Tree(tree) => tree,
            Self::Array(array) => array,
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn OwnershipSet {
        match self {
            Self::Tree(tree) => tree,
            Self::Array(array) => array,
        }
    }
}

impl OwnershipSet for FrameSet {
    fn insert(&mut self, addr: Address) -> ScopeResult<()> {
        self.as_dyn_mut().insert(addr)
    }

    fn remove(&mut self, addr: Address) -> bool {
        self.as_dyn_mut().remove(addr)
    }

    fn contains(&self, addr: Address) -> bool {
        self.as_dyn().contains(addr)
    }

    fn len(&self) -> usize {
        self.as_dyn().len()
    }

    fn destroy_all(&mut self, release: &mut dyn FnMut(Address)) {
        self.as_dyn_mut().destroy_all(release);
    }

    fn addresses(&self) -> Vec<Address> {
        self.as_dyn().addresses()
    }
}
