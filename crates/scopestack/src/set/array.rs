//! Fixed-capacity ownership set
//!
//! The slot table is allocated once, when the frame is created, and that
//! allocation is fallible like every other bookkeeping allocation. Inserts scan
//! for the first free slot, removals scan for the address; both are
//! O(capacity), which is the right trade for scopes whose allocation count is
//! small and known up front.

use core::iter::Flatten;
use core::slice;

use super::{Address, OwnershipSet};
use crate::allocator::array_size;
use crate::error::{ScopeError, ScopeResult};

/// Slot array of owned addresses
#[derive(Debug)]
pub struct ArraySet {
    slots: Box<[Option<Address>]>,
    len: usize,
}

impl ArraySet {
    /// Creates an empty set able to hold `capacity` addresses
    ///
    /// Fails instead of aborting when the slot table cannot be allocated:
    /// `SizeOverflow` if its byte size does not fit in `usize`, `OutOfMemory`
    /// if the heap refuses it.
    pub fn try_with_capacity(capacity: usize) -> ScopeResult<Self> {
        let bytes = array_size(capacity, size_of::<Option<Address>>())?;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| ScopeError::out_of_memory(bytes))?;
        slots.resize(capacity, None);

        Ok(Self {
            slots: slots.into_boxed_slice(),
            len: 0,
        })
    }

    /// A set with no slots; every insert fails with `CapacityExceeded`
    #[must_use]
    pub fn empty() -> Self {
        Self {
            slots: Box::default(),
            len: 0,
        }
    }

    /// Declared capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots still free
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    /// Raw slot view, occupied or not
    #[must_use]
    pub fn slots(&self) -> &[Option<Address>] {
        &self.slots
    }

    /// Owned addresses in slot order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            slots: self.slots.iter().flatten(),
        }
    }
}

/// Slot-order iterator over an [`ArraySet`]
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    slots: Flatten<slice::Iter<'a, Option<Address>>>,
}

impl Iterator for Iter<'_> {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        self.slots.next().copied()
    }
}

impl<'a> IntoIterator for &'a ArraySet {
    type Item = Address;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl OwnershipSet for ArraySet {
    fn insert(&mut self, addr: Address) -> ScopeResult<()> {
        let mut free = None;
        for (index, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(owned) if *owned == addr => return Err(ScopeError::already_tracked(addr)),
                None if free.is_none() => free = Some(index),
                _ => {}
            }
        }

        let index = free.ok_or_else(|| ScopeError::capacity_exceeded(self.capacity()))?;
        self.slots[index] = Some(addr);
        self.len += 1;
        Ok(())
    }

    fn remove(&mut self, addr: Address) -> bool {
        match self.slots.iter_mut().find(|slot| **slot == Some(addr)) {
            Some(slot) => {
                *slot = None;
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    fn contains(&self, addr: Address) -> bool {
        self.slots.contains(&Some(addr))
    }

    fn len(&self) -> usize {
        self.len
    }

    fn destroy_all(&mut self, release: &mut dyn FnMut(Address)) {
        for slot in &mut self.slots {
            if let Some(addr) = slot.take() {
                release(addr);
            }
        }
        self.len = 0;
    }

    fn addresses(&self) -> Vec<Address> {
        self.iter().collect()
    }
}
