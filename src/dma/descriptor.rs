//! Hardware-visible DMA descriptors
//!
//! Layout follows the linked-list item format walked by the SDIO slave DMA:
//!
//! ```text
//! word 0: size[11:0] | length[23:12] | reserved | eof[30] | owner[31]
//! word 1: buffer address
//! word 2: next descriptor address (0 terminates)
//! ```
//!
//! The owner bit is the handshake: software arms a descriptor by setting it,
//! hardware clears it once the buffer was filled (receive) or drained (send).

use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Word 0 bit definitions
#[allow(missing_docs)]
pub mod ctrl {
    pub const SIZE_SHIFT: u32 = 0;
    pub const SIZE_MASK: u32 = 0xFFF;

    pub const LENGTH_SHIFT: u32 = 12;
    pub const LENGTH_MASK: u32 = 0xFFF;

    pub const EOF: u32 = 1 << 30;
    pub const OWNER_DMA: u32 = 1 << 31;
}

/// Who may touch a descriptor (and the buffer behind it) right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescriptorOwner {
    /// Software owns it; DMA stops when it reaches this descriptor
    Cpu,
    /// Armed for the DMA engine
    Dma,
}

/// One DMA linked-list item
///
/// Must live in DMA-capable, non-cacheable memory for as long as the driver runs.
#[repr(C, align(4))]
pub struct DmaDescriptor {
    ctrl: AtomicU32,
    buffer: AtomicUsize,
    next: AtomicUsize,
}

impl DmaDescriptor {
    /// Largest value the size/length fields can hold
    pub const MAX_LENGTH: usize = ctrl::LENGTH_MASK as usize;

    /// Create an unarmed, unlinked descriptor
    pub const fn new() -> Self {
        Self {
            ctrl: AtomicU32::new(0),
            buffer: AtomicUsize::new(0),
            next: AtomicUsize::new(0),
        }
    }

    /// Current owner
    pub fn owner(&self) -> DescriptorOwner {
        if self.ctrl.load(Ordering::Acquire) & ctrl::OWNER_DMA != 0 {
            DescriptorOwner::Dma
        } else {
            DescriptorOwner::Cpu
        }
    }

    /// Buffer capacity the DMA engine may use
    pub fn size(&self) -> usize {
        ((self.ctrl.load(Ordering::Acquire) >> ctrl::SIZE_SHIFT) & ctrl::SIZE_MASK) as usize
    }

    /// Valid bytes in the buffer
    pub fn length(&self) -> usize {
        ((self.ctrl.load(Ordering::Acquire) >> ctrl::LENGTH_SHIFT) & ctrl::LENGTH_MASK) as usize
    }

    /// Boundary flag: last descriptor of a packet
    pub fn is_eof(&self) -> bool {
        self.ctrl.load(Ordering::Acquire) & ctrl::EOF != 0
    }

    /// Buffer address
    pub fn buffer_addr(&self) -> usize {
        self.buffer.load(Ordering::Acquire)
    }

    /// Next descriptor in the chain, `None` at the end of an open chain
    pub fn next(&self) -> Option<NonNull<DmaDescriptor>> {
        NonNull::new(self.next.load(Ordering::Acquire) as *mut DmaDescriptor)
    }

    /// Hand the descriptor back to software after a transfer
    ///
    /// This is the DMA engine's side of the handshake; only hardware models
    /// (and the driver itself when the engine is halted) call it.
    pub fn complete(&self, length: usize, eof: bool) {
        let current = self.ctrl.load(Ordering::Acquire);
        let mut value = current & (ctrl::SIZE_MASK << ctrl::SIZE_SHIFT);
        value |= ((length as u32) & ctrl::LENGTH_MASK) << ctrl::LENGTH_SHIFT;
        if eof {
            value |= ctrl::EOF;
        }
        self.ctrl.store(value, Ordering::Release);
    }

    /// Point at a buffer and give the descriptor to DMA
    ///
    /// The owner bit is published last so the engine never sees a half-written item.
    pub(crate) fn arm(&self, buffer: usize, size: usize, length: usize, eof: bool) {
        debug_assert!(size <= Self::MAX_LENGTH && length <= size);
        self.buffer.store(buffer, Ordering::Relaxed);
        let mut value = ((size as u32) & ctrl::SIZE_MASK) << ctrl::SIZE_SHIFT;
        value |= ((length as u32) & ctrl::LENGTH_MASK) << ctrl::LENGTH_SHIFT;
        if eof {
            value |= ctrl::EOF;
        }
        self.ctrl.store(value | ctrl::OWNER_DMA, Ordering::Release);
    }

    /// Re-arm with the same buffer and size, clearing length and eof
    pub(crate) fn rearm(&self) {
        let size = self.ctrl.load(Ordering::Acquire) & (ctrl::SIZE_MASK << ctrl::SIZE_SHIFT);
        self.ctrl.store(size | ctrl::OWNER_DMA, Ordering::Release);
    }

    pub(crate) fn link(&self, next: Option<&DmaDescriptor>) {
        let addr = next.map_or(0, |d| d as *const DmaDescriptor as usize);
        self.next.store(addr, Ordering::Release);
    }

    /// Back to software with no buffer attached
    pub(crate) fn clear(&self) {
        self.ctrl.store(0, Ordering::Release);
        self.buffer.store(0, Ordering::Release);
    }
}

impl Default for DmaDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptor storage for both links
///
/// Place it in a DMA-capable section:
///
/// ```no_run
/// use sdio_slave::dma::DescriptorMemory;
///
/// #[link_section = ".dma"]
/// static DESCRIPTORS: DescriptorMemory<32, 16> = DescriptorMemory::new();
/// ```
#[repr(C, align(4))]
pub struct DescriptorMemory<const RX: usize, const TX: usize> {
    recv: [DmaDescriptor; RX],
    send: [DmaDescriptor; TX],
}

impl<const RX: usize, const TX: usize> DescriptorMemory<RX, TX> {
    /// Create zeroed descriptor storage (const-compatible)
    pub const fn new() -> Self {
        Self {
            recv: [const { DmaDescriptor::new() }; RX],
            send: [const { DmaDescriptor::new() }; TX],
        }
    }

    /// Receive link descriptors
    pub fn recv(&self) -> &[DmaDescriptor; RX] {
        &self.recv
    }

    /// Send link descriptors
    pub fn send(&self) -> &[DmaDescriptor; TX] {
        &self.send
    }
}

impl<const RX: usize, const TX: usize> Default for DescriptorMemory<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}
