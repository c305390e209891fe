//! Driver configuration
//!
//! One [`SlaveConfig`] is handed to [`SdioSlave::initialize`](crate::SdioSlave::initialize)
//! and stays fixed for the lifetime of the driver instance.

use crate::error::{Result, SlaveError};
use bitflags::bitflags;

/// Largest receive buffer the DMA engine can describe (12-bit length field, word aligned)
pub const MAX_RECV_BUFFER_SIZE: usize = 4096 - 4;

/// Largest single send transfer (one descriptor, no chaining)
pub const MAX_SEND_LENGTH: usize = 4096 - 4;

/// Default receive buffer size shared by host and slave
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 512;

/// Default send queue depth
pub const DEFAULT_SEND_QUEUE_SIZE: usize = 8;

/// Bus sampling/driving edges
///
/// Passed through to [`SlaveHal::configure`](crate::hal::SlaveHal::configure);
/// the engine itself does not interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timing {
    /// Send at posedge, sample at posedge. Default for high speed hosts.
    #[default]
    PsendPsample,
    /// Send at negedge, sample at posedge. Default for default speed hosts.
    NsendPsample,
    /// Send at posedge, sample at negedge
    PsendNsample,
    /// Send at negedge, sample at negedge
    NsendNsample,
}

/// How queued sends are presented to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendingMode {
    /// Host may read across request boundaries; as much data as possible per read
    Stream,
    /// Every send request ends a packet (descriptor carries EOF)
    #[default]
    Packet,
}

bitflags! {
    /// Optional pin and bus features
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SlaveFlags: u32 {
        /// Free the DAT2 pin in 1-bit mode
        const DAT2_DISABLED = 1 << 0;
        /// Free the DAT1 pin; host must poll interrupt registers instead
        const HOST_INTR_DISABLED = 1 << 1;
        /// Enable internal pull-ups on the used pins (debug only)
        const INTERNAL_PULLUP = 1 << 2;
        /// Hide high-speed capability from the host
        const DEFAULT_SPEED = 1 << 3;
    }
}

impl SlaveFlags {
    /// High-speed capable (the default)
    pub const HIGH_SPEED: Self = Self::empty();
}

/// Host interrupt notification, called from interrupt context with the line number (0-7)
///
/// Must not block and must not call driver operations that wait.
pub type EventCallback = fn(u8);

/// SDIO slave configuration
#[derive(Debug, Clone, Copy)]
pub struct SlaveConfig {
    /// Bus timing mode
    pub timing: Timing,
    /// Stream or packet sending
    pub sending_mode: SendingMode,
    /// Maximum number of send requests in flight (including finished, not yet collected)
    pub send_queue_size: usize,
    /// Size of every receive buffer, agreed with the host in advance
    pub recv_buffer_size: usize,
    /// Host interrupt callback
    pub event_cb: Option<EventCallback>,
    /// Optional features
    pub flags: SlaveFlags,
}

impl SlaveConfig {
    /// Configuration with default values
    pub const fn new() -> Self {
        Self {
            timing: Timing::PsendPsample,
            sending_mode: SendingMode::Packet,
            send_queue_size: DEFAULT_SEND_QUEUE_SIZE,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            event_cb: None,
            flags: SlaveFlags::HIGH_SPEED,
        }
    }

    /// Set bus timing
    pub const fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Set sending mode
    pub const fn sending_mode(mut self, mode: SendingMode) -> Self {
        self.sending_mode = mode;
        self
    }

    /// Set send queue depth
    pub const fn send_queue_size(mut self, size: usize) -> Self {
        self.send_queue_size = size;
        self
    }

    /// Set receive buffer size
    pub const fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set host interrupt callback
    pub const fn event_cb(mut self, cb: EventCallback) -> Self {
        self.event_cb = Some(cb);
        self
    }

    /// Set feature flags
    pub const fn flags(mut self, flags: SlaveFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Check the configuration against a send ring of `send_ring_depth` slots
    pub fn validate(&self, send_ring_depth: usize) -> Result<()> {
        if self.send_queue_size == 0 || self.send_queue_size > send_ring_depth {
            return Err(SlaveError::InvalidArgument);
        }
        if self.recv_buffer_size == 0
            || self.recv_buffer_size > MAX_RECV_BUFFER_SIZE
            || self.recv_buffer_size % 4 != 0
        {
            return Err(SlaveError::InvalidArgument);
        }
        Ok(())
    }
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self::new()
    }
}
