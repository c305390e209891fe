//! Receive reassembly
//!
//! Host writes land in loaded receive buffers in ring order. A write longer
//! than one buffer spans several descriptors; only the last one carries the
//! boundary flag. Buffers are handed back strictly in arrival order, each
//! tagged as an interior fragment or the end of a packet.

use crate::dma::{DescriptorRing, DmaDescriptor};
use crate::error::Result;
use crate::registry::{BufferHandle, BufferRegion};
use core::ptr::NonNull;

/// Boundary tracking between returned buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketState {
    /// Last returned buffer ended a packet (or nothing returned yet)
    #[default]
    Idle,
    /// Last returned buffer was an interior fragment
    Open,
}

/// A receive buffer handed back to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    handle: BufferHandle,
    addr: NonNull<u8>,
    len: usize,
}

// Points into `'static` memory the application owns again.
unsafe impl Send for Received {}

impl Received {
    /// Buffer the data arrived in
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Start of the buffer
    pub fn addr(&self) -> NonNull<u8> {
        self.addr
    }

    /// Valid bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Zero-length write from the host
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Received bytes
    ///
    /// # Safety
    ///
    /// The buffer must not be loaded again (or unregistered and reused) while
    /// the returned slice is alive.
    pub unsafe fn data(&self) -> &[u8] {
        // SAFETY: the region is at least `len` bytes and owned by the caller
        unsafe { core::slice::from_raw_parts(self.addr.as_ptr(), self.len) }
    }
}

/// Result of a packet-aware receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus {
    /// Last fragment of a packet
    Finished(Received),
    /// Interior fragment; more of the same packet follows
    NotFinished(Received),
}

impl RecvStatus {
    /// The fragment regardless of position
    pub fn received(&self) -> &Received {
        match self {
            Self::Finished(rx) | Self::NotFinished(rx) => rx,
        }
    }

    /// Unwrap into the fragment
    pub fn into_received(self) -> Received {
        match self {
            Self::Finished(rx) | Self::NotFinished(rx) => rx,
        }
    }

    /// Ends a packet
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Receive ring plus packet boundary state
pub struct Reassembly<const N: usize> {
    ring: DescriptorRing<BufferHandle, N>,
    state: PacketState,
}

impl<const N: usize> Reassembly<N> {
    /// Reassembly over all `N` receive descriptors
    pub fn new(descriptors: &'static [DmaDescriptor; N]) -> Self {
        Self {
            ring: DescriptorRing::new(descriptors, N),
            state: PacketState::Idle,
        }
    }

    /// Current boundary state
    pub fn state(&self) -> PacketState {
        self.state
    }

    /// Buffers loaded (armed or waiting to be collected)
    pub fn loaded(&self) -> usize {
        self.ring.len()
    }

    /// Buffers armed and still waiting for host data
    pub fn armed(&self) -> usize {
        self.ring.pending()
    }

    /// No descriptor free for another buffer
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Arm a descriptor for `size` bytes of `region`
    pub fn load(&mut self, handle: BufferHandle, region: BufferRegion, size: usize) -> Result<()> {
        self.ring
            .push(region.addr.as_ptr() as usize, size, 0, false, handle)
            .map(|_| ())
    }

    /// Pick up buffers the host has written
    pub fn observe_completed(&mut self) -> usize {
        self.ring.observe_completed()
    }

    /// Hand back the oldest filled buffer and advance the boundary state
    pub fn take(&mut self) -> Option<RecvStatus> {
        let done = self.ring.peek_completed()?;
        let addr = NonNull::new(done.buffer as *mut u8)?;
        self.ring.pop_completed();
        let rx = Received {
            handle: done.companion,
            addr,
            len: done.length,
        };
        Some(if done.eof {
            self.state = PacketState::Idle;
            RecvStatus::Finished(rx)
        } else {
            self.state = PacketState::Open;
            RecvStatus::NotFinished(rx)
        })
    }

    /// Drop uncollected data: filled buffers go back to DMA, state to idle
    ///
    /// Returns the number of buffers re-armed. Link must be halted.
    pub fn discard(&mut self) -> usize {
        self.state = PacketState::Idle;
        self.ring.rearm_completed()
    }

    /// Where the receive link picks up again
    pub fn resume_point(&self) -> NonNull<DmaDescriptor> {
        self.ring.resume_point()
    }
}
