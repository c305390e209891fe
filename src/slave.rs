//! Driver facade and link control
//!
//! [`SdioSlave`] owns the hardware handle and every piece of driver state
//! behind one [`IrqMutex`]. Application calls take the lock briefly, never
//! across a wait; [`SdioSlave::handle_interrupt`] takes the same lock from
//! interrupt context.

use crate::config::SlaveConfig;
use crate::dma::{dma_barrier, DescriptorMemory};
use crate::error::{Result, SlaveError};
use crate::hal::{HostInterrupt, SlaveHal, SlaveInterrupt};
use crate::host::{self, HostSignals};
use crate::recv::{PacketState, Reassembly, RecvStatus, Received};
use crate::registry::{BufferHandle, BufferOwner, BufferRegistry};
use crate::send::{validate_send_buffer, SendQueue};
use crate::stats::{LinkSnapshot, LinkStats};
use crate::sync::IrqMutex;
use crate::wait::{block_on, Waiter, FOREVER};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

/// Only one driver instance may be live
static SLAVE_INITIALIZED: AtomicBool = AtomicBool::new(false);

struct Inner<H, const RX: usize, const TX: usize> {
    hal: H,
    registry: BufferRegistry<RX>,
    recv: Reassembly<RX>,
    send: SendQueue<TX>,
    started: bool,
    /// Receive tokens earned while stopped, pushed at the next start
    pending_tokens: u32,
    /// Tag for the next `transmit`, counting down from `usize::MAX`
    transmit_tag: usize,
}

impl<H: SlaveHal, const RX: usize, const TX: usize> Inner<H, RX, TX> {
    fn enqueue(&mut self, buf: &'static [u8], tag: usize) -> Result<()> {
        let total = self.send.enqueue(buf, tag)?;
        dma_barrier();
        if self.started {
            self.hal.send_link_append();
            self.hal.set_send_length(total);
        }
        Ok(())
    }

    fn take_received(&mut self) -> Option<RecvStatus> {
        let status = self.recv.take()?;
        let handle = status.received().handle();
        if let Err(_err) = self.registry.mark_received(handle) {
            #[cfg(feature = "defmt")]
            defmt::warn!("Received buffer {} was not driver-owned: {}", handle, _err);
        }
        Some(status)
    }

    /// Drop buffered data and zero the counters; link must be stopped
    fn reset_links(&mut self) {
        self.recv.observe_completed();
        self.send.observe_completed();

        let _rearmed = self.recv.discard();
        let _flushed = self.send.flush();
        self.send.reset_counter();
        self.hal.reset_counters();
        self.pending_tokens = self.recv.loaded() as u32;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Link reset: {} receive buffers re-armed, {} sends flushed",
            _rearmed,
            _flushed
        );
    }
}

/// SDIO slave driver instance
///
/// `RX` is the number of receive descriptors (and registry slots), `TX` the
/// number of send descriptors. Share it between threads and the interrupt
/// handler by reference (typically from a `static`).
///
/// ```no_run
/// use sdio_slave::dma::DescriptorMemory;
///
/// static DESCRIPTORS: DescriptorMemory<32, 16> = DescriptorMemory::new();
/// ```
pub struct SdioSlave<H: SlaveHal, W: Waiter, const RX: usize = 32, const TX: usize = 16> {
    inner: IrqMutex<Inner<H, RX, TX>>,
    waiter: W,
    config: SlaveConfig,
    signals: HostSignals,
    stats: LinkStats,
}

impl<H: SlaveHal, W: Waiter, const RX: usize, const TX: usize> SdioSlave<H, W, RX, TX> {
    /// Bring up the driver
    ///
    /// Fails with [`SlaveError::InvalidArgument`] for a bad configuration and
    /// [`SlaveError::InvalidState`] while another instance is live.
    pub fn initialize(
        config: SlaveConfig,
        mut hal: H,
        waiter: W,
        descriptors: &'static DescriptorMemory<RX, TX>,
    ) -> Result<Self> {
        config.validate(TX)?;
        if SLAVE_INITIALIZED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            #[cfg(feature = "defmt")]
            defmt::warn!("SDIO slave already initialized");
            return Err(SlaveError::InvalidState);
        }

        hal.configure(config.timing, config.flags);
        hal.set_dma_enabled(false);
        hal.set_io_ready(false);
        hal.reset_counters();

        let inner = Inner {
            hal,
            registry: BufferRegistry::new(),
            recv: Reassembly::new(descriptors.recv()),
            send: SendQueue::new(descriptors.send(), config.send_queue_size, config.sending_mode),
            started: false,
            pending_tokens: 0,
            transmit_tag: usize::MAX,
        };

        #[cfg(feature = "defmt")]
        defmt::info!(
            "SDIO slave initialized: {} receive slots of {}B, send queue {}, {}",
            RX,
            config.recv_buffer_size,
            config.send_queue_size,
            config.sending_mode
        );

        Ok(Self {
            inner: IrqMutex::new(inner),
            waiter,
            config,
            signals: HostSignals::new(),
            stats: LinkStats::new(),
        })
    }

    /// Stop the hardware and release the instance slot
    pub fn deinit(self) {
        drop(self);
    }

    /// Active configuration
    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    /// Counter snapshot
    pub fn stats(&self) -> LinkSnapshot {
        self.stats.snapshot()
    }

    // ---- Buffer registry ----

    /// Register a receive buffer
    ///
    /// The buffer must be 4-byte aligned and at least the configured receive
    /// buffer size. Fails with [`SlaveError::NoMemory`] when all `RX` slots
    /// are taken.
    pub fn register_buffer(&self, buf: &'static mut [u8]) -> Result<BufferHandle> {
        let size = self.config.recv_buffer_size;
        self.inner.lock(|inner| inner.registry.register(buf, size))
    }

    /// Unregister a buffer the application owns
    pub fn unregister_buffer(&self, handle: BufferHandle) -> Result<()> {
        self.inner.lock(|inner| inner.registry.unregister(handle))
    }

    /// Hand a buffer to the driver for receiving
    ///
    /// Each load credits the host with one receive token, immediately while
    /// the link runs, otherwise at the next [`start`](Self::start).
    pub fn load_buffer(&self, handle: BufferHandle) -> Result<()> {
        let size = self.config.recv_buffer_size;
        self.inner.lock(|inner| {
            match inner.registry.owner(handle) {
                Some(owner) if !owner.is_driver() => {}
                _ => return Err(SlaveError::InvalidArgument),
            }
            if inner.recv.is_full() {
                return Err(SlaveError::QueueFull);
            }
            let started = inner.started;
            let region = inner.registry.mark_loaded(handle, started)?;
            inner.recv.load(handle, region, size)?;
            dma_barrier();
            if started {
                inner.hal.recv_link_append();
                inner.hal.add_recv_tokens(1);
            } else {
                inner.pending_tokens += 1;
            }
            Ok(())
        })
    }

    /// Address and usable size of a registered buffer
    ///
    /// The size is the configured receive buffer size, whatever the length of
    /// the region that was registered.
    pub fn get_buffer(&self, handle: BufferHandle) -> Option<(NonNull<u8>, usize)> {
        let size = self.config.recv_buffer_size;
        self.inner
            .lock(|inner| inner.registry.region(handle))
            .map(|region| (region.addr, size))
    }

    /// Ownership state of a registered buffer
    pub fn buffer_owner(&self, handle: BufferHandle) -> Option<BufferOwner> {
        self.inner.lock(|inner| inner.registry.owner(handle))
    }

    // ---- Send queue ----

    /// Queue `buf` for the host to read
    ///
    /// Waits up to `timeout` for a free slot. A zero timeout turns a full queue
    /// into [`SlaveError::QueueFull`] instead of [`SlaveError::Timeout`].
    pub fn send_queue(&self, buf: &'static [u8], tag: usize, timeout: Duration) -> Result<()> {
        validate_send_buffer(buf)?;
        let result = block_on(&self.waiter, timeout, || {
            self.inner.lock(|inner| match inner.enqueue(buf, tag) {
                Err(SlaveError::QueueFull) => None,
                other => Some(other),
            })
        });
        match result {
            Ok(Ok(())) => {
                self.stats.record_send(buf.len());
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(SlaveError::Timeout) => {
                self.stats.record_queue_full();
                #[cfg(feature = "defmt")]
                defmt::debug!("Send queue full (tag {})", tag);
                if timeout.is_zero() {
                    Err(SlaveError::QueueFull)
                } else {
                    Err(SlaveError::Timeout)
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Collect the tag of the oldest finished send
    pub fn send_get_finished(&self, timeout: Duration) -> Result<usize> {
        let tag = block_on(&self.waiter, timeout, || {
            self.inner.lock(|inner| inner.send.take_finished())
        })?;
        // A slot just freed up
        self.waiter.wake_all();
        Ok(tag)
    }

    /// Send `buf` and wait until the host has read it
    ///
    /// The send queue must be empty so the completion collected here is this
    /// request's own; otherwise [`SlaveError::InvalidState`]. Requests are
    /// tagged downwards from `usize::MAX`. If a concurrent
    /// [`send_get_finished`](Self::send_get_finished) takes this completion,
    /// the foreign one collected instead is reported as
    /// [`SlaveError::InvalidState`].
    pub fn transmit(&self, buf: &'static [u8]) -> Result<()> {
        validate_send_buffer(buf)?;
        let tag = self.inner.lock(|inner| {
            if !inner.send.is_empty() {
                return Err(SlaveError::InvalidState);
            }
            let tag = inner.transmit_tag;
            inner.enqueue(buf, tag)?;
            inner.transmit_tag = tag.wrapping_sub(1);
            Ok(tag)
        })?;
        self.stats.record_send(buf.len());

        let finished = self.send_get_finished(FOREVER)?;
        if finished != tag {
            #[cfg(feature = "defmt")]
            defmt::warn!("transmit collected tag {} instead of {}", finished, tag);
            return Err(SlaveError::InvalidState);
        }
        Ok(())
    }

    // ---- Receive ----

    /// Next received buffer, ignoring packet boundaries
    pub fn recv(&self, timeout: Duration) -> Result<Received> {
        self.recv_packet(timeout).map(RecvStatus::into_received)
    }

    /// Next received buffer, tagged as packet end or interior fragment
    pub fn recv_packet(&self, timeout: Duration) -> Result<RecvStatus> {
        let status = block_on(&self.waiter, timeout, || {
            self.inner.lock(|inner| inner.take_received())
        })?;
        let rx = status.received();
        self.stats.record_delivered(rx.len(), status.is_finished());
        Ok(status)
    }

    /// A multi-buffer packet is partially delivered
    pub fn packet_open(&self) -> bool {
        self.inner.lock(|inner| inner.recv.state()) == PacketState::Open
    }

    // ---- Host registers and interrupts ----

    /// Read a shared register (0-27, 32-63)
    pub fn read_register(&self, pos: u8) -> Result<u8> {
        host::check_readable(pos)?;
        Ok(self.inner.lock(|inner| inner.hal.read_reg(pos)))
    }

    /// Write a shared register (0-11, 14-15, 18-19, 24-27, 32-63)
    pub fn write_register(&self, pos: u8, value: u8) -> Result<()> {
        host::check_writable(pos)?;
        self.inner.lock(|inner| inner.hal.write_reg(pos, value));
        Ok(())
    }

    /// Current host interrupt enable mask
    pub fn host_interrupt_enable(&self) -> HostInterrupt {
        self.inner.lock(|inner| inner.hal.host_int_enable())
    }

    /// Set which lines may interrupt the host
    pub fn set_host_interrupt_enable(&self, mask: HostInterrupt) {
        self.inner.lock(|inner| inner.hal.set_host_int_enable(mask));
    }

    /// Raise line `pos` (0-7) toward the host
    pub fn send_host_interrupt(&self, pos: u8) -> Result<()> {
        let line = HostInterrupt::line(pos).ok_or(SlaveError::InvalidArgument)?;
        self.inner.lock(|inner| inner.hal.raise_host_int(line));
        Ok(())
    }

    /// Clear lines toward the host
    pub fn clear_host_interrupt(&self, mask: HostInterrupt) {
        self.inner.lock(|inner| inner.hal.clear_host_int(mask));
    }

    /// Wait for the host to raise line `pos` (0-7) and consume it
    pub fn wait_interrupt(&self, pos: u8, timeout: Duration) -> Result<()> {
        let line = HostInterrupt::line(pos).ok_or(SlaveError::InvalidArgument)?;
        block_on(&self.waiter, timeout, || self.signals.take(line).then_some(()))
    }

    // ---- Link control ----

    /// Link is running
    pub fn is_started(&self) -> bool {
        self.inner.lock(|inner| inner.started)
    }

    /// Start both DMA links and tell the host the slave is ready
    pub fn start(&self) -> Result<()> {
        self.inner.lock(|inner| {
            if inner.started {
                return Err(SlaveError::InvalidState);
            }
            inner.recv.observe_completed();
            inner.send.observe_completed();

            let recv_head = inner.recv.resume_point();
            let send_head = inner.send.resume_point();
            inner.hal.recv_link_start(recv_head);
            inner.hal.send_link_start(send_head);

            let tokens = core::mem::take(&mut inner.pending_tokens);
            if tokens > 0 {
                inner.hal.add_recv_tokens(tokens);
            }
            inner.hal.set_send_length(inner.send.queued_bytes());
            inner.registry.set_link_running(true);

            dma_barrier();
            inner.hal.set_dma_enabled(true);
            inner.hal.set_io_ready(true);
            inner.started = true;

            #[cfg(feature = "defmt")]
            defmt::info!(
                "SDIO slave started: {} receive buffers armed, {} sends queued",
                inner.recv.armed(),
                inner.send.len()
            );
            Ok(())
        })?;
        self.waiter.wake_all();
        Ok(())
    }

    /// Halt both DMA links; buffered data and counters are kept
    pub fn stop(&self) {
        self.inner.lock(|inner| {
            inner.hal.set_dma_enabled(false);
            inner.hal.set_io_ready(false);
            inner.recv.observe_completed();
            inner.send.observe_completed();
            inner.registry.set_link_running(false);
            if inner.started {
                #[cfg(feature = "defmt")]
                defmt::info!("SDIO slave stopped");
            }
            inner.started = false;
        });
        self.waiter.wake_all();
    }

    /// Discard buffered data and zero the link counters
    ///
    /// Filled-but-uncollected receive buffers are re-armed, unsent requests
    /// come back through [`send_get_finished`](Self::send_get_finished).
    /// Only while stopped.
    pub fn reset(&self) -> Result<()> {
        self.inner.lock(|inner| {
            if inner.started {
                return Err(SlaveError::InvalidState);
            }
            inner.reset_links();
            Ok(())
        })?;
        self.after_reset();
        Ok(())
    }

    /// [`reset`](Self::reset) plus a full peripheral reset
    pub fn reset_hardware(&self) -> Result<()> {
        let config = self.config;
        self.inner.lock(|inner| {
            if inner.started {
                return Err(SlaveError::InvalidState);
            }
            inner.hal.reset_peripheral();
            inner.hal.configure(config.timing, config.flags);
            inner.reset_links();
            Ok(())
        })?;
        self.after_reset();
        Ok(())
    }

    fn after_reset(&self) {
        self.signals.clear();
        self.stats.reset();
        self.waiter.wake_all();
    }

    // ---- Interrupt entry ----

    /// Service the peripheral interrupt
    ///
    /// Call from the SDIO slave interrupt vector. Never blocks. The event
    /// callback, if configured, runs after the driver lock is released.
    pub fn handle_interrupt(&self) {
        let (status, recv_done, send_done) = self.inner.lock(|inner| {
            let status = inner.hal.take_interrupts();
            let recv_done = if status.contains(SlaveInterrupt::RX_DONE) {
                inner.recv.observe_completed()
            } else {
                0
            };
            let send_done = if status.contains(SlaveInterrupt::TX_DONE) {
                inner.send.observe_completed()
            } else {
                0
            };
            (status, recv_done, send_done)
        });

        let host_lines = status.host_lines();
        let lines = host::lines(host_lines);
        self.stats.record_interrupt(recv_done, send_done, lines.len());

        if !host_lines.is_empty() {
            self.signals.raise(host_lines);
            if let Some(callback) = self.config.event_cb {
                for &line in &lines {
                    callback(line);
                }
            }
        }

        if !status.is_empty() {
            self.waiter.wake_all();
        }
    }
}

impl<H: SlaveHal, W: Waiter, const RX: usize, const TX: usize> Drop for SdioSlave<H, W, RX, TX> {
    fn drop(&mut self) {
        self.inner.lock(|inner| {
            inner.hal.set_dma_enabled(false);
            inner.hal.set_io_ready(false);
            inner.started = false;
            inner.hal.deinit();
        });
        SLAVE_INITIALIZED.store(false, Ordering::Release);

        #[cfg(feature = "defmt")]
        defmt::info!("SDIO slave deinitialized");
    }
}
