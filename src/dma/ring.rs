//! Circular descriptor ring shared between software and the DMA engine
//!
//! Occupied slots form a contiguous window starting at `head`. The first
//! `observed` slots of that window have been handed back by hardware and seen
//! by the interrupt handler; the rest are still armed. Software appends at the
//! tail and retires strictly from the head, so completions come out in the
//! order requests went in.

use super::descriptor::{DescriptorOwner, DmaDescriptor};
use crate::error::{Result, SlaveError};
use core::ptr::NonNull;

/// A descriptor hardware has finished with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed<C> {
    /// Ring slot
    pub index: usize,
    /// Software-side word stored at push time
    pub companion: C,
    /// Buffer address
    pub buffer: usize,
    /// Bytes transferred
    pub length: usize,
    /// Boundary flag
    pub eof: bool,
}

/// Fixed-depth descriptor ring
///
/// `C` is a software-only companion value per slot (buffer handle, caller
/// tag). The DMA engine never sees it.
pub struct DescriptorRing<C: Copy, const N: usize> {
    descriptors: &'static [DmaDescriptor; N],
    companions: [Option<C>; N],
    depth: usize,
    head: usize,
    len: usize,
    observed: usize,
}

impl<C: Copy, const N: usize> DescriptorRing<C, N> {
    /// Build a ring over the first `depth` descriptors and link them circularly
    ///
    /// `depth` is clamped to `1..=N`.
    pub fn new(descriptors: &'static [DmaDescriptor; N], depth: usize) -> Self {
        let depth = depth.clamp(1, N.max(1));
        let ring = Self {
            descriptors,
            companions: [None; N],
            depth,
            head: 0,
            len: 0,
            observed: 0,
        };
        ring.link();
        ring
    }

    fn link(&self) {
        let used = &self.descriptors[..self.depth];
        for (i, desc) in used.iter().enumerate() {
            desc.clear();
            desc.link(Some(&used[(i + 1) % self.depth]));
        }
    }

    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % self.depth
    }

    /// Usable slots
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Occupied slots (armed plus completed-but-not-retired)
    pub fn len(&self) -> usize {
        self.len
    }

    /// No occupied slots
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// No free slot left
    pub fn is_full(&self) -> bool {
        self.len == self.depth
    }

    /// Slots still owned by the DMA engine
    pub fn pending(&self) -> usize {
        self.len - self.observed
    }

    /// Slots completed and waiting to be retired
    pub fn completed(&self) -> usize {
        self.observed
    }

    /// Arm the tail slot and append it to the window
    ///
    /// Fails with [`SlaveError::QueueFull`] when every slot is occupied; the
    /// ring is left untouched in that case.
    pub fn push(
        &mut self,
        buffer: usize,
        size: usize,
        length: usize,
        eof: bool,
        companion: C,
    ) -> Result<usize> {
        if self.is_full() {
            return Err(SlaveError::QueueFull);
        }
        let index = self.slot(self.len);
        self.companions[index] = Some(companion);
        self.descriptors[index].arm(buffer, size, length, eof);
        self.len += 1;
        Ok(index)
    }

    /// Advance over descriptors hardware has handed back
    ///
    /// Stops at the first one still owned by DMA. Returns how many were newly
    /// observed.
    pub fn observe_completed(&mut self) -> usize {
        let before = self.observed;
        while self.observed < self.len {
            let index = self.slot(self.observed);
            if self.descriptors[index].owner() == DescriptorOwner::Dma {
                break;
            }
            self.observed += 1;
        }
        self.observed - before
    }

    /// Oldest observed completion, without retiring it
    pub fn peek_completed(&self) -> Option<Completed<C>> {
        if self.observed == 0 {
            return None;
        }
        let index = self.head;
        let desc = &self.descriptors[index];
        let companion = self.companions[index]?;
        Some(Completed {
            index,
            companion,
            buffer: desc.buffer_addr(),
            length: desc.length(),
            eof: desc.is_eof(),
        })
    }

    /// Retire the oldest observed completion and free its slot
    pub fn pop_completed(&mut self) -> Option<Completed<C>> {
        let completed = self.peek_completed()?;
        self.descriptors[completed.index].clear();
        self.companions[completed.index] = None;
        self.head = self.slot(1);
        self.len -= 1;
        self.observed -= 1;
        Some(completed)
    }

    /// First descriptor hardware has not finished yet
    ///
    /// When nothing is pending this is the slot the next push will arm, so a
    /// link started here picks new work up in order.
    pub fn resume_point(&self) -> NonNull<DmaDescriptor> {
        NonNull::from(&self.descriptors[self.slot(self.observed)])
    }

    /// Hand every observed-but-unretired descriptor back to DMA
    ///
    /// Buffers and companions stay where they are. Returns the number re-armed.
    pub fn rearm_completed(&mut self) -> usize {
        for offset in 0..self.observed {
            self.descriptors[self.slot(offset)].rearm();
        }
        let count = self.observed;
        self.observed = 0;
        count
    }

    /// Take every still-armed descriptor back from DMA as if it had completed
    ///
    /// Only valid while the engine is halted. Returns the number taken back.
    pub fn force_complete_all(&mut self) -> usize {
        let count = self.pending();
        for offset in self.observed..self.len {
            let desc = &self.descriptors[self.slot(offset)];
            desc.complete(desc.length(), desc.is_eof());
        }
        self.observed = self.len;
        count
    }
}
