//! Shared test utilities for sdio-slave tests
//!
//! The driver is a process-wide singleton, so every test that creates one
//! holds [`serial`] for its whole duration.

#![allow(dead_code)]

pub mod mock_hardware;

pub use mock_hardware::{HostRead, MockHal, SimHost};

use sdio_slave::dma::DescriptorMemory;
use sdio_slave::{BufferHandle, SdioSlave, SlaveConfig, StdWaiter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Receive descriptors / registry slots used by the tests
pub const RX: usize = 8;
/// Send descriptors used by the tests
pub const TX: usize = 4;
/// Receive buffer size used unless a test says otherwise
pub const BUF_SIZE: usize = 64;

/// Short timeout for calls expected to succeed promptly or fail
pub const SHORT: Duration = Duration::from_millis(20);
/// Generous timeout for calls that wait on another thread
pub const LONG: Duration = Duration::from_secs(5);

pub type TestSlave = SdioSlave<MockHal, StdWaiter, RX, TX>;

/// Serialize tests that create a driver instance
pub fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fresh descriptor memory for one test
pub fn descriptors() -> &'static DescriptorMemory<RX, TX> {
    Box::leak(Box::new(DescriptorMemory::new()))
}

/// Zeroed, word-aligned buffer of `len` bytes
pub fn aligned_buffer(len: usize) -> &'static mut [u8] {
    let words: &'static mut [u32] = Box::leak(vec![0u32; len.div_ceil(4)].into_boxed_slice());
    // SAFETY: the word slice covers at least `len` bytes and lives forever
    unsafe { std::slice::from_raw_parts_mut(words.as_mut_ptr().cast::<u8>(), len) }
}

/// Word-aligned copy of `data` suitable for sending
pub fn send_buffer(data: &[u8]) -> &'static [u8] {
    let buf = aligned_buffer(data.len());
    buf.copy_from_slice(data);
    buf
}

/// Deterministic test pattern
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

/// Driver with the default test geometry plus the host that talks to it
pub fn setup(config: SlaveConfig) -> (TestSlave, SimHost) {
    let (host, hal) = SimHost::new();
    let slave = SdioSlave::initialize(config, hal, StdWaiter::new(), descriptors())
        .expect("driver initialization");
    (slave, host)
}

/// Default configuration with test-sized buffers
pub fn test_config() -> SlaveConfig {
    SlaveConfig::new().recv_buffer_size(BUF_SIZE).send_queue_size(TX)
}

/// Register and load `count` receive buffers
pub fn load_buffers(slave: &TestSlave, count: usize) -> Vec<BufferHandle> {
    (0..count)
        .map(|_| {
            let handle = slave.register_buffer(aligned_buffer(BUF_SIZE)).expect("register");
            slave.load_buffer(handle).expect("load");
            handle
        })
        .collect()
}

/// Bytes of a received buffer
pub fn received_bytes(rx: &sdio_slave::Received) -> Vec<u8> {
    // SAFETY: the buffer is not reloaded while the copy is made
    unsafe { rx.data() }.to_vec()
}
