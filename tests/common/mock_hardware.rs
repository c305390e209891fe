//! Simulated SDIO host and DMA engine
//!
//! `MockHal` is what the driver talks to; `SimHost` is what a test drives to
//! play the host. Both share one `SimState`. The DMA model walks descriptor
//! chains exactly like the peripheral: it follows next pointers from the
//! address it was started at and stalls on the first descriptor it does not
//! own.

use sdio_slave::dma::{DescriptorOwner, DmaDescriptor};
use sdio_slave::{HostInterrupt, SlaveFlags, SlaveHal, SlaveInterrupt, Timing};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Peripheral state visible to both sides
pub struct SimState {
    pub configured: Option<(Timing, SlaveFlags)>,
    pub dma_enabled: bool,
    pub io_ready: bool,
    pub recv_cursor: Option<usize>,
    pub send_cursor: Option<usize>,
    pub recv_tokens: u32,
    pub send_length: u32,
    pub pending: u32,
    pub registers: [u8; 64],
    pub host_int_enable: u8,
    pub host_int_raised: u8,
    pub counter_resets: usize,
    pub peripheral_resets: usize,
    pub deinit_calls: usize,
    pub recv_appends: usize,
    pub send_appends: usize,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            configured: None,
            dma_enabled: false,
            io_ready: false,
            recv_cursor: None,
            send_cursor: None,
            recv_tokens: 0,
            send_length: 0,
            pending: 0,
            registers: [0; 64],
            host_int_enable: 0,
            host_int_raised: 0,
            counter_resets: 0,
            peripheral_resets: 0,
            deinit_calls: 0,
            recv_appends: 0,
            send_appends: 0,
        }
    }
}

type Shared = Arc<Mutex<SimState>>;

fn lock(state: &Shared) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Descriptor at an address the driver handed to the link
fn descriptor(addr: usize) -> &'static DmaDescriptor {
    // SAFETY: addresses come from 'static DescriptorMemory
    unsafe { &*(addr as *const DmaDescriptor) }
}

/// Hardware backend used by the driver under test
#[derive(Clone)]
pub struct MockHal {
    state: Shared,
}

impl SlaveHal for MockHal {
    fn configure(&mut self, timing: Timing, flags: SlaveFlags) {
        lock(&self.state).configured = Some((timing, flags));
    }

    fn deinit(&mut self) {
        let mut state = lock(&self.state);
        state.deinit_calls += 1;
        state.configured = None;
    }

    fn set_dma_enabled(&mut self, enabled: bool) {
        lock(&self.state).dma_enabled = enabled;
    }

    fn set_io_ready(&mut self, ready: bool) {
        lock(&self.state).io_ready = ready;
    }

    fn reset_peripheral(&mut self) {
        let mut state = lock(&self.state);
        state.peripheral_resets += 1;
        state.recv_cursor = None;
        state.send_cursor = None;
        state.pending = 0;
    }

    fn recv_link_start(&mut self, head: NonNull<DmaDescriptor>) {
        lock(&self.state).recv_cursor = Some(head.as_ptr() as usize);
    }

    fn recv_link_append(&mut self) {
        lock(&self.state).recv_appends += 1;
    }

    fn send_link_start(&mut self, head: NonNull<DmaDescriptor>) {
        lock(&self.state).send_cursor = Some(head.as_ptr() as usize);
    }

    fn send_link_append(&mut self) {
        lock(&self.state).send_appends += 1;
    }

    fn add_recv_tokens(&mut self, count: u32) {
        lock(&self.state).recv_tokens += count;
    }

    fn set_send_length(&mut self, total: u32) {
        lock(&self.state).send_length = total;
    }

    fn reset_counters(&mut self) {
        let mut state = lock(&self.state);
        state.recv_tokens = 0;
        state.send_length = 0;
        state.counter_resets += 1;
    }

    fn take_interrupts(&mut self) -> SlaveInterrupt {
        let mut state = lock(&self.state);
        SlaveInterrupt::from_bits_truncate(std::mem::take(&mut state.pending))
    }

    fn read_reg(&self, pos: u8) -> u8 {
        lock(&self.state).registers[pos as usize]
    }

    fn write_reg(&mut self, pos: u8, value: u8) {
        lock(&self.state).registers[pos as usize] = value;
    }

    fn host_int_enable(&self) -> HostInterrupt {
        HostInterrupt::from_bits_truncate(lock(&self.state).host_int_enable)
    }

    fn set_host_int_enable(&mut self, mask: HostInterrupt) {
        lock(&self.state).host_int_enable = mask.bits();
    }

    fn raise_host_int(&mut self, mask: HostInterrupt) {
        lock(&self.state).host_int_raised |= mask.bits();
    }

    fn clear_host_int(&mut self, mask: HostInterrupt) {
        lock(&self.state).host_int_raised &= !mask.bits();
    }
}

/// One descriptor's worth of data read by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRead {
    pub data: Vec<u8>,
    pub eof: bool,
}

/// The host side of the bus plus the DMA engine
#[derive(Clone)]
pub struct SimHost {
    state: Shared,
}

impl SimHost {
    /// Create a connected host/backend pair
    pub fn new() -> (Self, MockHal) {
        let state: Shared = Arc::new(Mutex::new(SimState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockHal { state },
        )
    }

    /// Inspect the peripheral state
    pub fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    /// Host writes one packet; DMA spreads it over armed receive buffers
    ///
    /// Returns the number of descriptors filled. Raises `RX_DONE` if any.
    /// Stops early (packet truncated, no boundary) when buffers run out.
    pub fn write(&self, packet: &[u8]) -> usize {
        let mut state = lock(&self.state);
        if !state.dma_enabled {
            return 0;
        }
        let mut filled = 0;
        let mut offset = 0;
        while offset < packet.len() {
            let Some(addr) = state.recv_cursor else { break };
            let desc = descriptor(addr);
            if desc.owner() != DescriptorOwner::Dma {
                break;
            }
            let chunk = desc.size().min(packet.len() - offset);
            // SAFETY: the descriptor points at a buffer of `size` bytes owned by DMA
            unsafe {
                std::ptr::copy_nonoverlapping(
                    packet[offset..].as_ptr(),
                    desc.buffer_addr() as *mut u8,
                    chunk,
                );
            }
            offset += chunk;
            desc.complete(chunk, offset == packet.len());
            state.recv_cursor = desc.next().map(|next| next.as_ptr() as usize);
            filled += 1;
        }
        if filled > 0 {
            state.pending |= SlaveInterrupt::RX_DONE.bits();
        }
        filled
    }

    /// Receive buffers armed ahead of the DMA cursor (what the host's token
    /// count tells it)
    pub fn armed(&self) -> usize {
        let state = lock(&self.state);
        let Some(start) = state.recv_cursor else { return 0 };
        let mut count = 0;
        let mut addr = start;
        loop {
            let desc = descriptor(addr);
            if desc.owner() != DescriptorOwner::Dma {
                break;
            }
            count += 1;
            match desc.next() {
                Some(next) if next.as_ptr() as usize != start => addr = next.as_ptr() as usize,
                _ => break,
            }
        }
        count
    }

    /// Host reads everything queued; DMA drains armed send descriptors
    ///
    /// Raises `TX_DONE` if anything was read.
    pub fn read_all(&self) -> Vec<HostRead> {
        self.read(usize::MAX)
    }

    /// Host reads at most `limit` descriptors
    pub fn read(&self, limit: usize) -> Vec<HostRead> {
        let mut state = lock(&self.state);
        let mut reads = Vec::new();
        if !state.dma_enabled {
            return reads;
        }
        while reads.len() < limit {
            let Some(addr) = state.send_cursor else { break };
            let desc = descriptor(addr);
            if desc.owner() != DescriptorOwner::Dma {
                break;
            }
            // SAFETY: armed send descriptors point at `length` valid bytes
            let data = unsafe {
                std::slice::from_raw_parts(desc.buffer_addr() as *const u8, desc.length())
            }
            .to_vec();
            reads.push(HostRead {
                data,
                eof: desc.is_eof(),
            });
            desc.complete(desc.length(), desc.is_eof());
            state.send_cursor = desc.next().map(|next| next.as_ptr() as usize);
        }
        if !reads.is_empty() {
            state.pending |= SlaveInterrupt::TX_DONE.bits();
        }
        reads
    }

    /// Host raises general purpose line `line` toward the slave
    pub fn raise_line(&self, line: u8) {
        lock(&self.state).pending |= SlaveInterrupt::host_line(line).bits();
    }

    /// Host reads a shared register
    pub fn register(&self, pos: u8) -> u8 {
        lock(&self.state).registers[pos as usize]
    }

    /// Host writes a shared register
    pub fn set_register(&self, pos: u8, value: u8) {
        lock(&self.state).registers[pos as usize] = value;
    }

    /// Receive tokens the host has been credited with
    pub fn recv_tokens(&self) -> u32 {
        lock(&self.state).recv_tokens
    }

    /// Packet length counter the host sees
    pub fn send_length(&self) -> u32 {
        lock(&self.state).send_length
    }

    /// Lines the slave currently raises toward the host
    pub fn slave_lines(&self) -> HostInterrupt {
        HostInterrupt::from_bits_truncate(lock(&self.state).host_int_raised)
    }
}
