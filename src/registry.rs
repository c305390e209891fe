//! Receive buffer registry
//!
//! Fixed table of caller-supplied receive buffers. Each slot records the
//! buffer region and which side currently owns it. Handles carry a generation
//! so a handle kept past `unregister` cannot reach the slot's next tenant.

use crate::dma::is_dma_aligned;
use crate::error::{Result, SlaveError};
use core::ptr::NonNull;

/// Stable identifier of a registered receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferHandle {
    index: u16,
    generation: u32,
}

impl BufferHandle {
    /// Registry slot
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Slot generation at registration time
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Who owns a registered buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferOwner {
    /// Registered, not loaded
    Application,
    /// Loaded while the link is stopped
    DriverQueued,
    /// Loaded while the link runs; DMA may write it at any time
    DriverHardware,
    /// Handed back by a receive call with valid data
    ApplicationHoldingData,
}

impl BufferOwner {
    /// Owned by the driver (may not be touched or unregistered by the caller)
    pub const fn is_driver(self) -> bool {
        matches!(self, Self::DriverQueued | Self::DriverHardware)
    }
}

/// Memory behind a registered buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRegion {
    /// Start of the region
    pub addr: NonNull<u8>,
    /// Region length as supplied by the caller
    pub len: usize,
}

#[derive(Clone, Copy)]
struct Slot {
    region: Option<BufferRegion>,
    owner: BufferOwner,
    generation: u32,
}

impl Slot {
    const EMPTY: Self = Self {
        region: None,
        owner: BufferOwner::Application,
        generation: 0,
    };
}

/// Table of up to `N` receive buffers
pub struct BufferRegistry<const N: usize> {
    slots: [Slot; N],
    registered: usize,
}

// Regions are `'static` memory handed over for the driver's lifetime; the
// table itself is only ever reached through the driver lock.
unsafe impl<const N: usize> Send for BufferRegistry<N> {}

impl<const N: usize> BufferRegistry<N> {
    /// Empty registry
    pub const fn new() -> Self {
        Self {
            slots: [Slot::EMPTY; N],
            registered: 0,
        }
    }

    /// Number of registered buffers
    pub fn len(&self) -> usize {
        self.registered
    }

    /// No registered buffers
    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }

    /// Maximum number of registered buffers
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Take ownership of `buf` for receiving
    ///
    /// `buf` must hold at least `min_len` bytes and be DMA aligned. Fails with
    /// [`SlaveError::NoMemory`] once every slot is taken.
    pub fn register(&mut self, buf: &'static mut [u8], min_len: usize) -> Result<BufferHandle> {
        if buf.len() < min_len || !is_dma_aligned(buf.as_ptr() as usize) {
            return Err(SlaveError::InvalidArgument);
        }
        let Some(index) = self.slots.iter().position(|slot| slot.region.is_none()) else {
            #[cfg(feature = "defmt")]
            defmt::warn!("Receive buffer registry full ({} slots)", N);
            return Err(SlaveError::NoMemory);
        };

        let len = buf.len();
        let slot = &mut self.slots[index];
        slot.region = Some(BufferRegion {
            addr: NonNull::from(buf).cast(),
            len,
        });
        slot.owner = BufferOwner::Application;
        self.registered += 1;

        Ok(BufferHandle {
            index: index as u16,
            generation: slot.generation,
        })
    }

    fn slot(&self, handle: BufferHandle) -> Result<&Slot> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.region.is_some() && slot.generation == handle.generation)
            .ok_or(SlaveError::InvalidArgument)
    }

    fn slot_mut(&mut self, handle: BufferHandle) -> Result<&mut Slot> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.region.is_some() && slot.generation == handle.generation)
            .ok_or(SlaveError::InvalidArgument)
    }

    /// Release a buffer back to the caller for good
    ///
    /// Rejected for stale handles and for buffers the driver owns.
    pub fn unregister(&mut self, handle: BufferHandle) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        if slot.owner.is_driver() {
            return Err(SlaveError::InvalidArgument);
        }
        slot.region = None;
        slot.owner = BufferOwner::Application;
        slot.generation = slot.generation.wrapping_add(1);
        self.registered -= 1;
        Ok(())
    }

    /// Check a handle is current
    pub fn contains(&self, handle: BufferHandle) -> bool {
        self.slot(handle).is_ok()
    }

    /// Current owner, `None` for stale handles
    pub fn owner(&self, handle: BufferHandle) -> Option<BufferOwner> {
        self.slot(handle).ok().map(|slot| slot.owner)
    }

    /// Region behind a handle, `None` for stale handles
    pub fn region(&self, handle: BufferHandle) -> Option<BufferRegion> {
        self.slot(handle).ok().and_then(|slot| slot.region)
    }

    /// Hand a buffer to the driver
    ///
    /// Allowed from [`BufferOwner::Application`] and
    /// [`BufferOwner::ApplicationHoldingData`]; the target state depends on
    /// whether the link runs.
    pub fn mark_loaded(&mut self, handle: BufferHandle, link_running: bool) -> Result<BufferRegion> {
        let slot = self.slot_mut(handle)?;
        if slot.owner.is_driver() {
            return Err(SlaveError::InvalidArgument);
        }
        let region = slot.region.ok_or(SlaveError::InvalidArgument)?;
        slot.owner = if link_running {
            BufferOwner::DriverHardware
        } else {
            BufferOwner::DriverQueued
        };
        Ok(region)
    }

    /// A loaded buffer came back from DMA with data
    pub fn mark_received(&mut self, handle: BufferHandle) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        if !slot.owner.is_driver() {
            return Err(SlaveError::InvalidState);
        }
        slot.owner = BufferOwner::ApplicationHoldingData;
        Ok(())
    }

    /// Move every loaded buffer between the queued and hardware states
    pub fn set_link_running(&mut self, running: bool) {
        for slot in self.slots.iter_mut().filter(|slot| slot.region.is_some()) {
            slot.owner = match (slot.owner, running) {
                (BufferOwner::DriverQueued, true) => BufferOwner::DriverHardware,
                (BufferOwner::DriverHardware, false) => BufferOwner::DriverQueued,
                (owner, _) => owner,
            };
        }
    }
}

impl<const N: usize> Default for BufferRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}
