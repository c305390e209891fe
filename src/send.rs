//! Send queue
//!
//! Each request occupies one send descriptor from enqueue until its completion
//! is collected. Completions come back in submission order carrying the
//! caller's tag.

use crate::config::{SendingMode, MAX_SEND_LENGTH};
use crate::dma::{align_dma, is_dma_aligned, DescriptorRing, DmaDescriptor};
use crate::error::{Result, SlaveError};
use core::ptr::NonNull;

/// Check a send buffer before it goes anywhere near the ring
pub fn validate_send_buffer(buf: &[u8]) -> Result<()> {
    if buf.is_empty() || buf.len() > MAX_SEND_LENGTH || !is_dma_aligned(buf.as_ptr() as usize) {
        return Err(SlaveError::InvalidArgument);
    }
    Ok(())
}

/// Pending send requests and the host-visible packet length counter
pub struct SendQueue<const N: usize> {
    ring: DescriptorRing<usize, N>,
    mode: SendingMode,
    queued_bytes: u32,
}

impl<const N: usize> SendQueue<N> {
    /// Queue over `depth` of the given descriptors
    pub fn new(descriptors: &'static [DmaDescriptor; N], depth: usize, mode: SendingMode) -> Self {
        Self {
            ring: DescriptorRing::new(descriptors, depth),
            mode,
            queued_bytes: 0,
        }
    }

    /// Requests in flight or finished but not collected
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Nothing in flight and nothing to collect
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// No room for another request
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Total bytes ever queued since the last counter reset
    pub fn queued_bytes(&self) -> u32 {
        self.queued_bytes
    }

    /// Arm a descriptor for `buf`
    ///
    /// Returns the new packet length total to publish to the host.
    pub fn enqueue(&mut self, buf: &'static [u8], tag: usize) -> Result<u32> {
        validate_send_buffer(buf)?;
        let eof = self.mode == SendingMode::Packet;
        self.ring
            .push(buf.as_ptr() as usize, align_dma(buf.len()), buf.len(), eof, tag)?;
        self.queued_bytes = self.queued_bytes.wrapping_add(buf.len() as u32);
        Ok(self.queued_bytes)
    }

    /// Pick up descriptors the host has read
    pub fn observe_completed(&mut self) -> usize {
        self.ring.observe_completed()
    }

    /// Collect the oldest finished request's tag
    pub fn take_finished(&mut self) -> Option<usize> {
        self.ring.pop_completed().map(|done| done.companion)
    }

    /// Return every unsent request through the completion path
    ///
    /// Link must be halted.
    pub fn flush(&mut self) -> usize {
        self.ring.force_complete_all()
    }

    /// Zero the packet length counter
    pub fn reset_counter(&mut self) {
        self.queued_bytes = 0;
    }

    /// Where the send link picks up again
    pub fn resume_point(&self) -> NonNull<DmaDescriptor> {
        self.ring.resume_point()
    }
}
