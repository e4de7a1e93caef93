//! Standalone error types for scopestack
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.

use thiserror::Error;
use tracing::{error, warn};

use crate::set::Address;

// ============================================================================
// Main Error Types
// ============================================================================

/// Errors reported by frames, ownership sets and the allocation facade
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    // --- Allocation Errors ---
    #[error("Memory allocation failed: {size} bytes")]
    OutOfMemory { size: usize },

    #[error("Size of {count} elements of {size} bytes overflows usize")]
    SizeOverflow { count: usize, size: usize },

    #[error("Reallocation of {addr} to {size} bytes failed and the original block could not be re-tracked; it was released")]
    ReallocLost { addr: Address, size: usize },

    // --- Tracking Errors ---
    #[error("Ownership tracking failed: {reason}")]
    TrackingFailure { reason: TrackingFailureReason },

    // --- Frame Errors ---
    #[error("Address {addr} is not owned by the current frame")]
    NotOwned { addr: Address },

    #[error("No active frame on this stack")]
    NoActiveFrame,

    // --- Configuration Errors ---
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Why an ownership set refused an insert
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingFailureReason {
    /// A tree bookkeeping node could not be allocated
    #[error("no bookkeeping node available (limit: {})", .limit.map_or_else(|| "none".to_string(), |l| l.to_string()))]
    NodeExhausted { limit: Option<usize> },

    /// Every slot of an array set is occupied
    #[error("array capacity {capacity} exceeded")]
    CapacityExceeded { capacity: usize },

    /// The address is already owned by a frame of this stack
    #[error("address {addr} is already tracked")]
    AlreadyTracked { addr: Address },
}

impl ScopeError {
    /// Check if error is retryable
    ///
    /// Exhaustion of memory or of bookkeeping space may clear up once other
    /// allocations are released; ownership errors never do.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::OutOfMemory { .. } => true,
            Self::TrackingFailure { reason } => !matches!(reason, TrackingFailureReason::AlreadyTracked { .. }),
            _ => false,
        }
    }

    /// True for every error that belongs to the out-of-memory class
    ///
    /// `ReallocLost` is out-of-memory with the added fact that the original
    /// block is gone; `SizeOverflow` is a request no heap could satisfy.
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(
            self,
            Self::OutOfMemory { .. } | Self::SizeOverflow { .. } | Self::ReallocLost { .. }
        )
    }

    /// True if this is a tracking failure
    #[must_use]
    pub fn is_tracking_failure(&self) -> bool {
        matches!(self, Self::TrackingFailure { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfMemory { .. } => "SCOPE:ALLOC:OOM",
            Self::SizeOverflow { .. } => "SCOPE:ALLOC:OVERFLOW",
            Self::ReallocLost { .. } => "SCOPE:ALLOC:LOST",
            Self::TrackingFailure { .. } => "SCOPE:TRACK:FAILED",
            Self::NotOwned { .. } => "SCOPE:FRAME:NOT_OWNED",
            Self::NoActiveFrame => "SCOPE:FRAME:NONE",
            Self::InvalidConfig { .. } => "SCOPE:CONFIG:INVALID",
        }
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create out of memory error
    pub fn out_of_memory(size: usize) -> Self {
        warn!(size, "base allocator exhausted");
        Self::OutOfMemory { size }
    }

    /// Create size overflow error for `count * size`
    pub fn size_overflow(count: usize, size: usize) -> Self {
        warn!(count, size, "requested size overflows usize");
        Self::SizeOverflow { count, size }
    }

    /// Create the dual-failure resize error
    pub fn realloc_lost(addr: Address, size: usize) -> Self {
        error!(%addr, size, "resize failed twice; original block released");
        Self::ReallocLost { addr, size }
    }

    /// Create tracking failure error
    pub fn tracking(reason: TrackingFailureReason) -> Self {
        warn!(%reason, "ownership tracking failed");
        Self::TrackingFailure { reason }
    }

    /// Create node exhausted tracking error
    pub fn node_exhausted(limit: Option<usize>) -> Self {
        Self::tracking(TrackingFailureReason::NodeExhausted { limit })
    }

    /// Create capacity exceeded tracking error
    pub fn capacity_exceeded(capacity: usize) -> Self {
        Self::tracking(TrackingFailureReason::CapacityExceeded { capacity })
    }

    /// Create already tracked error
    pub fn already_tracked(addr: Address) -> Self {
        Self::tracking(TrackingFailureReason::AlreadyTracked { addr })
    }

    /// Create not owned error
    #[must_use]
    pub fn not_owned(addr: Address) -> Self {
        Self::NotOwned { addr }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for scopestack operations
pub type ScopeResult<T> = core::result::Result<T, ScopeError>;

// ============================================================================
// Tests
// ============================================================================
