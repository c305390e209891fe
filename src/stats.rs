//! Link statistics
//!
//! Lock-free counters updated from both the interrupt handler and
//! application calls. Byte counters saturate instead of wrapping.

use core::sync::atomic::{AtomicU32, Ordering};

/// Traffic and interrupt counters for one driver instance
pub struct LinkStats {
    /// Interrupt handler invocations
    pub interrupts: AtomicU32,
    /// Receive descriptors the host filled
    pub recv_buffers: AtomicU32,
    /// Receive buffers handed to the application
    pub recv_delivered: AtomicU32,
    /// Packets completed (boundary fragments delivered)
    pub recv_packets: AtomicU32,
    /// Bytes handed to the application
    pub recv_bytes: AtomicU32,
    /// Send requests accepted
    pub send_requests: AtomicU32,
    /// Bytes accepted for sending
    pub send_bytes: AtomicU32,
    /// Send descriptors the host has read
    pub send_completions: AtomicU32,
    /// Enqueue attempts that found the queue full
    pub send_queue_full: AtomicU32,
    /// Interrupt lines raised by the host
    pub host_interrupts: AtomicU32,
}

impl LinkStats {
    /// All counters zero
    pub const fn new() -> Self {
        Self {
            interrupts: AtomicU32::new(0),
            recv_buffers: AtomicU32::new(0),
            recv_delivered: AtomicU32::new(0),
            recv_packets: AtomicU32::new(0),
            recv_bytes: AtomicU32::new(0),
            send_requests: AtomicU32::new(0),
            send_bytes: AtomicU32::new(0),
            send_completions: AtomicU32::new(0),
            send_queue_full: AtomicU32::new(0),
            host_interrupts: AtomicU32::new(0),
        }
    }

    fn add(counter: &AtomicU32, amount: usize) {
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
            Some(current.saturating_add(amount as u32))
        });
    }

    /// Interrupt handler ran
    #[inline(always)]
    pub fn record_interrupt(&self, recv_done: usize, send_done: usize, host_lines: usize) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
        Self::add(&self.recv_buffers, recv_done);
        Self::add(&self.send_completions, send_done);
        Self::add(&self.host_interrupts, host_lines);
    }

    /// A receive buffer went back to the application
    #[inline(always)]
    pub fn record_delivered(&self, bytes: usize, end_of_packet: bool) {
        self.recv_delivered.fetch_add(1, Ordering::Relaxed);
        if end_of_packet {
            self.recv_packets.fetch_add(1, Ordering::Relaxed);
        }
        Self::add(&self.recv_bytes, bytes);
    }

    /// A send request was queued
    #[inline(always)]
    pub fn record_send(&self, bytes: usize) {
        self.send_requests.fetch_add(1, Ordering::Relaxed);
        Self::add(&self.send_bytes, bytes);
    }

    /// A send request bounced off a full queue
    #[inline(always)]
    pub fn record_queue_full(&self) {
        self.send_queue_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            interrupts: self.interrupts.load(Ordering::Relaxed),
            recv_buffers: self.recv_buffers.load(Ordering::Relaxed),
            recv_delivered: self.recv_delivered.load(Ordering::Relaxed),
            recv_packets: self.recv_packets.load(Ordering::Relaxed),
            recv_bytes: self.recv_bytes.load(Ordering::Relaxed),
            send_requests: self.send_requests.load(Ordering::Relaxed),
            send_bytes: self.send_bytes.load(Ordering::Relaxed),
            send_completions: self.send_completions.load(Ordering::Relaxed),
            send_queue_full: self.send_queue_full.load(Ordering::Relaxed),
            host_interrupts: self.host_interrupts.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.interrupts.store(0, Ordering::Relaxed);
        self.recv_buffers.store(0, Ordering::Relaxed);
        self.recv_delivered.store(0, Ordering::Relaxed);
        self.recv_packets.store(0, Ordering::Relaxed);
        self.recv_bytes.store(0, Ordering::Relaxed);
        self.send_requests.store(0, Ordering::Relaxed);
        self.send_bytes.store(0, Ordering::Relaxed);
        self.send_completions.store(0, Ordering::Relaxed);
        self.send_queue_full.store(0, Ordering::Relaxed);
        self.host_interrupts.store(0, Ordering::Relaxed);
    }
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of link counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct LinkSnapshot {
    pub interrupts: u32,
    pub recv_buffers: u32,
    pub recv_delivered: u32,
    pub recv_packets: u32,
    pub recv_bytes: u32,
    pub send_requests: u32,
    pub send_bytes: u32,
    pub send_completions: u32,
    pub send_queue_full: u32,
    pub host_interrupts: u32,
}

impl LinkSnapshot {
    /// Send requests accepted but not yet read by the host
    pub fn sends_outstanding(&self) -> u32 {
        self.send_requests.saturating_sub(self.send_completions)
    }

    /// Filled receive buffers not yet handed to the application
    pub fn recv_backlog(&self) -> u32 {
        self.recv_buffers.saturating_sub(self.recv_delivered)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkSnapshot {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "LinkSnapshot {{ irq: {}, rx: {} bufs / {} pkts / {}B, tx: {} reqs / {}B, backlog rx {} tx {} }}",
            self.interrupts,
            self.recv_delivered,
            self.recv_packets,
            self.recv_bytes,
            self.send_requests,
            self.send_bytes,
            self.recv_backlog(),
            self.sends_outstanding()
        );
    }
}
