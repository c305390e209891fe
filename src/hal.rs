//! Hardware access boundary
//!
//! The engine never touches SoC registers directly. Everything it needs from the
//! peripheral goes through [`SlaveHal`], implemented once per chip (or by a
//! simulator in tests). Implementations are called with the driver's critical
//! section held and must not block.

use crate::config::{SlaveFlags, Timing};
use crate::dma::DmaDescriptor;
use bitflags::bitflags;
use core::ptr::NonNull;

bitflags! {
    /// Slave-side interrupt status, read-and-cleared by [`SlaveHal::take_interrupts`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SlaveInterrupt: u32 {
        /// Host general purpose interrupt lines 0-7
        const HOST_LINES = 0xFF;
        /// Receive DMA finished one or more descriptors
        const RX_DONE = 1 << 8;
        /// Send DMA finished one or more descriptors
        const TX_DONE = 1 << 9;
    }
}

impl SlaveInterrupt {
    /// Host lines carried by this status word
    pub const fn host_lines(self) -> HostInterrupt {
        HostInterrupt::from_bits_truncate((self.bits() & Self::HOST_LINES.bits()) as u8)
    }

    /// Status with a single host line set
    pub const fn host_line(line: u8) -> Self {
        Self::from_bits_truncate(1 << (line & 0x7))
    }
}

bitflags! {
    /// General purpose interrupt lines between slave and host
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HostInterrupt: u8 {
        /// Line 0
        const GENERAL_0 = 1 << 0;
        /// Line 1
        const GENERAL_1 = 1 << 1;
        /// Line 2
        const GENERAL_2 = 1 << 2;
        /// Line 3
        const GENERAL_3 = 1 << 3;
        /// Line 4
        const GENERAL_4 = 1 << 4;
        /// Line 5
        const GENERAL_5 = 1 << 5;
        /// Line 6
        const GENERAL_6 = 1 << 6;
        /// Line 7
        const GENERAL_7 = 1 << 7;
    }
}

impl HostInterrupt {
    /// Number of general purpose lines
    pub const LINES: u8 = 8;

    /// Mask for a single line, `None` if `line` is out of range
    pub const fn line(line: u8) -> Option<Self> {
        if line < Self::LINES {
            Some(Self::from_bits_truncate(1 << line))
        } else {
            None
        }
    }
}

/// Opaque peripheral interface used by the engine
///
/// Descriptor addresses passed to the link methods point into the caller's
/// [`DescriptorMemory`](crate::dma::DescriptorMemory), which is `'static`.
pub trait SlaveHal: Send {
    /// Bring the peripheral up with the given bus options
    fn configure(&mut self, timing: Timing, flags: SlaveFlags);

    /// Release the peripheral (pins, clocks, interrupt allocation)
    fn deinit(&mut self);

    /// Enable or disable both DMA engines
    fn set_dma_enabled(&mut self, enabled: bool);

    /// Drive the ready status bit seen by the host
    fn set_io_ready(&mut self, ready: bool);

    /// Full peripheral reset, DMA state machines included
    fn reset_peripheral(&mut self);

    /// Point the receive DMA at `head` and start following the chain
    fn recv_link_start(&mut self, head: NonNull<DmaDescriptor>);

    /// New receive descriptors were handed to DMA behind the current one
    fn recv_link_append(&mut self);

    /// Point the send DMA at `head` and start following the chain
    fn send_link_start(&mut self, head: NonNull<DmaDescriptor>);

    /// New send descriptors were handed to DMA behind the current one
    fn send_link_append(&mut self);

    /// Credit the host with `count` more receive buffers
    fn add_recv_tokens(&mut self, count: u32);

    /// Publish the total number of bytes queued for the host to read
    fn set_send_length(&mut self, total: u32);

    /// Zero the token and packet length counters
    fn reset_counters(&mut self);

    /// Read and clear the pending interrupt status
    fn take_interrupts(&mut self) -> SlaveInterrupt;

    /// Read a shared register byte
    fn read_reg(&self, pos: u8) -> u8;

    /// Write a shared register byte
    fn write_reg(&mut self, pos: u8, value: u8);

    /// Current host interrupt enable mask
    fn host_int_enable(&self) -> HostInterrupt;

    /// Set the host interrupt enable mask
    fn set_host_int_enable(&mut self, mask: HostInterrupt);

    /// Raise interrupt lines toward the host
    fn raise_host_int(&mut self, mask: HostInterrupt);

    /// Clear interrupt lines toward the host
    fn clear_host_int(&mut self, mask: HostInterrupt);
}
