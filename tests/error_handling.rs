//! Error paths: rejected arguments, wrong states, and that failures change nothing

mod common;

use common::*;
use sdio_slave::{SdioSlave, SlaveConfig, SlaveError, StdWaiter};
use std::time::Duration;

#[test]
fn test_second_instance_rejected_until_drop() {
    let _guard = serial();
    let (slave, _host) = setup(test_config());

    let (_, hal) = SimHost::new();
    let second: Result<TestSlave, _> =
        SdioSlave::initialize(test_config(), hal, StdWaiter::new(), descriptors());
    assert_eq!(second.err(), Some(SlaveError::InvalidState));

    slave.deinit();
    let (_, hal) = SimHost::new();
    let third: Result<TestSlave, _> =
        SdioSlave::initialize(test_config(), hal, StdWaiter::new(), descriptors());
    assert!(third.is_ok());
}

#[test]
fn test_invalid_config_does_not_claim_instance() {
    let _guard = serial();
    for config in [
        test_config().send_queue_size(0),
        test_config().send_queue_size(TX + 1),
        test_config().recv_buffer_size(0),
        test_config().recv_buffer_size(4096),
        test_config().recv_buffer_size(62),
        SlaveConfig::new(),
    ] {
        let (_, hal) = SimHost::new();
        let result: Result<TestSlave, _> =
            SdioSlave::initialize(config, hal, StdWaiter::new(), descriptors());
        assert_eq!(result.err(), Some(SlaveError::InvalidArgument));
    }

    let (slave, _host) = setup(test_config());
    drop(slave);
}

#[test]
fn test_send_argument_checks() {
    let _guard = serial();
    let (slave, _host) = setup(test_config());

    let buf = send_buffer(&pattern(4096, 0));
    assert_eq!(slave.send_queue(&buf[..0], 0, SHORT), Err(SlaveError::InvalidArgument));
    assert_eq!(slave.send_queue(buf, 0, SHORT), Err(SlaveError::InvalidArgument));
    assert_eq!(slave.send_queue(&buf[2..10], 0, SHORT), Err(SlaveError::InvalidArgument));
    assert_eq!(slave.transmit(&buf[..0]), Err(SlaveError::InvalidArgument));

    assert!(slave.send_queue(&buf[..4092], 0, SHORT).is_ok());
    assert_eq!(slave.stats().send_requests, 1);
}

#[test]
fn test_register_buffer_checks() {
    let _guard = serial();
    let (slave, _host) = setup(test_config());

    assert_eq!(
        slave.register_buffer(aligned_buffer(BUF_SIZE - 4)),
        Err(SlaveError::InvalidArgument)
    );
    let (_, unaligned) = aligned_buffer(BUF_SIZE + 4).split_at_mut(2);
    assert_eq!(slave.register_buffer(unaligned), Err(SlaveError::InvalidArgument));
}

#[test]
fn test_register_position_checks() {
    let _guard = serial();
    let (slave, _host) = setup(test_config());

    for pos in [28, 29, 30, 31, 64, 255] {
        assert_eq!(slave.read_register(pos), Err(SlaveError::InvalidArgument));
    }
    for pos in [12, 13, 16, 17, 20, 21, 22, 23, 28, 31, 64] {
        assert_eq!(slave.write_register(pos, 1), Err(SlaveError::InvalidArgument));
    }
    assert_eq!(slave.read_register(27), Ok(0));
    assert_eq!(slave.read_register(32), Ok(0));
}

#[test]
fn test_interrupt_line_checks() {
    let _guard = serial();
    let (slave, _host) = setup(test_config());

    assert_eq!(slave.send_host_interrupt(8), Err(SlaveError::InvalidArgument));
    assert_eq!(slave.wait_interrupt(8, Duration::ZERO), Err(SlaveError::InvalidArgument));
    assert_eq!(slave.wait_interrupt(0, Duration::ZERO), Err(SlaveError::Timeout));
}

#[test]
fn test_link_state_checks() {
    let _guard = serial();
    let (slave, _host) = setup(test_config());

    slave.start().unwrap();
    assert_eq!(slave.start(), Err(SlaveError::InvalidState));
    assert_eq!(slave.reset(), Err(SlaveError::InvalidState));
    assert_eq!(slave.reset_hardware(), Err(SlaveError::InvalidState));

    slave.stop();
    slave.stop();
    assert!(!slave.is_started());
    assert!(slave.reset().is_ok());
}

#[test]
fn test_transmit_requires_empty_queue() {
    let _guard = serial();
    let (slave, host) = setup(test_config());
    slave.start().unwrap();

    slave.send_queue(send_buffer(&pattern(8, 0)), 1, SHORT).unwrap();
    assert_eq!(slave.transmit(send_buffer(&pattern(8, 1))), Err(SlaveError::InvalidState));

    // The queued request is untouched
    assert_eq!(host.read_all().len(), 1);
    slave.handle_interrupt();
    assert_eq!(slave.send_get_finished(SHORT), Ok(1));
}

#[test]
fn test_reload_with_full_ring_is_invalid_argument() {
    let _guard = serial();
    let (slave, host) = setup(test_config());
    let handles = load_buffers(&slave, RX);
    slave.start().unwrap();

    let err = slave.load_buffer(handles[0]).unwrap_err();
    assert_eq!(err, SlaveError::InvalidArgument);
    assert!(!err.is_retryable());
    assert_eq!(host.recv_tokens(), RX as u32);
}

#[test]
fn test_full_queue_failure_changes_nothing() {
    let _guard = serial();
    let (slave, host) = setup(test_config().send_queue_size(2));
    slave.start().unwrap();

    slave.send_queue(send_buffer(&pattern(4, 0)), 10, SHORT).unwrap();
    slave.send_queue(send_buffer(&pattern(4, 1)), 11, SHORT).unwrap();
    let length = host.send_length();

    assert_eq!(
        slave.send_queue(send_buffer(&pattern(4, 2)), 12, Duration::ZERO),
        Err(SlaveError::QueueFull)
    );
    assert_eq!(host.send_length(), length);

    assert_eq!(host.read_all().len(), 2);
    slave.handle_interrupt();
    assert_eq!(slave.send_get_finished(SHORT), Ok(10));
    assert_eq!(slave.send_get_finished(SHORT), Ok(11));
    assert_eq!(slave.send_get_finished(Duration::ZERO), Err(SlaveError::Timeout));
}

#[test]
fn test_error_display() {
    assert_eq!(SlaveError::QueueFull.to_string(), "Queue full");
    assert_eq!(SlaveError::NoMemory.to_string(), "No free buffer slot");
    assert!(SlaveError::QueueFull.is_resource_exhausted());
}
