//! SDIO slave error types

use core::fmt;

/// SDIO slave operation result type
pub type Result<T> = core::result::Result<T, SlaveError>;

/// SDIO slave error types
///
/// Every failing call leaves buffer ownership and ring state exactly as it was
/// before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveError {
    /// Stale handle, zero-length or oversized transfer, misaligned buffer,
    /// out-of-range or reserved register position
    InvalidArgument,
    /// Operation needs a started/stopped/initialized state that is not held,
    /// or a second driver instance was requested
    InvalidState,
    /// Deadline of a blocking call elapsed with no event
    Timeout,
    /// No free registry slot for another receive buffer
    NoMemory,
    /// Ring has no free slot and the caller asked not to wait
    QueueFull,
}

impl SlaveError {
    /// Transient conditions a caller may simply retry
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::NoMemory | Self::QueueFull)
    }

    /// Resource exhaustion (registry or ring capacity)
    pub const fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::NoMemory | Self::QueueFull)
    }
}

impl fmt::Display for SlaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::InvalidState => write!(f, "Invalid state"),
            Self::Timeout => write!(f, "Timeout"),
            Self::NoMemory => write!(f, "No free buffer slot"),
            Self::QueueFull => write!(f, "Queue full"),
        }
    }
}
