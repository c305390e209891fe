#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

//! SDIO slave buffer engine
//!
//! Slave-side buffer lifecycle and packet reassembly for an SDIO slave
//! controller. The host writes into receive buffers the application lends to
//! the driver and reads out of buffers the application queues for sending;
//! DMA moves the bytes, the driver keeps track of who owns what.
//!
//! # Core Components
//!
//! - [`registry`] - receive buffers and their ownership state
//! - [`dma`] - hardware descriptors and the circular rings built from them
//! - [`send`] - bounded send queue with in-order completion
//! - [`recv`] - receive reassembly across buffer boundaries
//! - [`host`] - shared registers and host interrupt lines
//! - [`slave`] - the [`SdioSlave`] driver instance and link control
//! - [`hal`] - the [`SlaveHal`] trait every chip backend implements
//!
//! # Usage
//!
//! ```no_run
//! # use sdio_slave::*;
//! # fn run<H: SlaveHal>(hal: H) -> Result<()> {
//! use core::time::Duration;
//! use sdio_slave::dma::DescriptorMemory;
//!
//! static DESCRIPTORS: DescriptorMemory<8, 4> = DescriptorMemory::new();
//!
//! #[repr(align(4))]
//! struct RxBuf([u8; 512]);
//! static mut RX_BUF: RxBuf = RxBuf([0; 512]);
//!
//! let config = SlaveConfig::new().send_queue_size(4);
//! let slave: SdioSlave<H, StdWaiter, 8, 4> =
//!     SdioSlave::initialize(config, hal, StdWaiter::new(), &DESCRIPTORS)?;
//!
//! // SAFETY: handed to the driver once, never touched elsewhere
//! let buf = unsafe { &mut (*core::ptr::addr_of_mut!(RX_BUF)).0 };
//! let handle = slave.register_buffer(buf)?;
//! slave.load_buffer(handle)?;
//! slave.start()?;
//!
//! let rx = slave.recv(Duration::from_millis(100))?;
//! slave.load_buffer(rx.handle())?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "defmt")]
use defmt as _;

pub mod config;
pub mod dma;
pub mod error;
pub mod hal;
pub mod host;
pub mod recv;
pub mod registry;
pub mod send;
pub mod slave;
pub mod stats;
pub mod sync;
pub mod wait;

pub use config::{EventCallback, SendingMode, SlaveConfig, SlaveFlags, Timing};
pub use error::{Result, SlaveError};
pub use hal::{HostInterrupt, SlaveHal, SlaveInterrupt};
pub use recv::{PacketState, RecvStatus, Received};
pub use registry::{BufferHandle, BufferOwner};
pub use slave::SdioSlave;
pub use stats::LinkSnapshot;
pub use wait::{Waiter, FOREVER};

#[cfg(feature = "std")]
pub use wait::StdWaiter;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use wait::WfiWaiter;
