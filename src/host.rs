//! Shared register block and host interrupt bookkeeping
//!
//! The host sees 64 byte-wide registers. Positions 28-31 carry the interrupt
//! vector and are never readable or writable as plain registers. A few more
//! positions are reserved for the controller and are read-only from the slave.

use crate::error::{Result, SlaveError};
use crate::hal::HostInterrupt;
use core::sync::atomic::{AtomicU8, Ordering};

/// Number of shared register positions
pub const REGISTER_COUNT: u8 = 64;

/// Positions occupied by the interrupt vector
pub const INTERRUPT_VECTOR: core::ops::RangeInclusive<u8> = 28..=31;

/// Slave may read this position
pub const fn is_readable(pos: u8) -> bool {
    matches!(pos, 0..=27 | 32..=63)
}

/// Slave may write this position
pub const fn is_writable(pos: u8) -> bool {
    matches!(pos, 0..=11 | 14..=15 | 18..=19 | 24..=27 | 32..=63)
}

pub(crate) fn check_readable(pos: u8) -> Result<()> {
    if is_readable(pos) {
        Ok(())
    } else {
        Err(SlaveError::InvalidArgument)
    }
}

pub(crate) fn check_writable(pos: u8) -> Result<()> {
    if is_writable(pos) {
        Ok(())
    } else {
        Err(SlaveError::InvalidArgument)
    }
}

/// Line numbers set in `mask`, lowest first
pub fn lines(mask: HostInterrupt) -> heapless::Vec<u8, { HostInterrupt::LINES as usize }> {
    (0..HostInterrupt::LINES)
        .filter(|&line| mask.bits() & (1 << line) != 0)
        .collect()
}

/// Host-raised lines not yet consumed by a waiter
pub struct HostSignals {
    pending: AtomicU8,
}

impl HostSignals {
    /// Nothing pending
    pub const fn new() -> Self {
        Self {
            pending: AtomicU8::new(0),
        }
    }

    /// Latch lines raised by the host
    pub fn raise(&self, mask: HostInterrupt) {
        self.pending.fetch_or(mask.bits(), Ordering::AcqRel);
    }

    /// Consume `line` if pending; check and clear are one atomic step
    pub fn take(&self, line: HostInterrupt) -> bool {
        self.pending.fetch_and(!line.bits(), Ordering::AcqRel) & line.bits() != 0
    }

    /// Lines currently pending
    pub fn pending(&self) -> HostInterrupt {
        HostInterrupt::from_bits_truncate(self.pending.load(Ordering::Acquire))
    }

    /// Drop every pending line
    pub fn clear(&self) {
        self.pending.store(0, Ordering::Release);
    }
}

impl Default for HostSignals {
    fn default() -> Self {
        Self::new()
    }
}
