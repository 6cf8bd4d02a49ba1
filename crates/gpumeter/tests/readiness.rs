//! The non-blocking readiness gate: probing, forced submission, and the
//! downgrade of submission failures.

use std::sync::Arc;

use gpumeter::cpu::SoftDevice;
use gpumeter::prelude::*;

fn ended_query(device: &Arc<SoftDevice>, value: u64) -> Query {
    let mut query = Query::new(device.clone(), QueryDesc::new(QueryKind::Occlusion))
        .expect("create query");
    device.set_counter(value);
    query.end();
    query
}

#[test]
fn test_probe_before_submission_is_not_ready() {
    let device = Arc::new(SoftDevice::new());
    let query = ended_query(&device, 5);

    let mut result = [0xAAu8; 8];
    assert!(!query.get_data(Some(&mut result), true, false).unwrap());
    assert_eq!(result, [0xAA; 8], "a probe must not write");
    // The probe also must not have submitted anything.
    assert_eq!(device.current_epoch(), Epoch::new(1));
}

#[test]
fn test_flush_forces_submission_without_waiting() {
    let device = Arc::new(SoftDevice::new());
    let query = ended_query(&device, 5);

    let before = device.current_epoch();
    let mut result = [0u8; 8];
    assert!(!query.get_data(Some(&mut result), false, false).unwrap());
    assert!(
        device.current_epoch() > before,
        "flush must submit the open batch"
    );
    assert_eq!(u64::from_ne_bytes(result), 0, "still not ready, no write");

    device.complete_all();
    assert!(query.get_data(Some(&mut result), false, false).unwrap());
    assert_eq!(u64::from_ne_bytes(result), 5);
}

#[test]
fn test_ready_after_wait_idle() {
    let device = Arc::new(SoftDevice::new());
    let query = ended_query(&device, 11);

    device.wait_idle().expect("wait idle");

    let mut result = [0u8; 8];
    assert!(query.get_data(Some(&mut result), false, false).unwrap());
    assert_eq!(u64::from_ne_bytes(result), 11);
}

#[test]
fn test_submit_failure_degrades_to_not_ready() {
    let device = Arc::new(SoftDevice::new());
    let query = ended_query(&device, 5);

    device.fail_next_submit();
    let mut result = [0u8; 8];
    // The gate is non-failing: a failed submit reads as "not ready".
    assert!(!query.get_data(Some(&mut result), false, false).unwrap());
    assert_eq!(device.current_epoch(), Epoch::new(1), "nothing was submitted");

    // The failure is not sticky: the next flush submits and completion
    // delivers the result.
    assert!(!query.get_data(Some(&mut result), false, false).unwrap());
    device.complete_all();
    assert!(query.get_data(Some(&mut result), false, false).unwrap());
    assert_eq!(u64::from_ne_bytes(result), 5);
}

#[test]
fn test_assume_complete_skips_the_gate() {
    let device = Arc::new(SoftDevice::new());
    let query = ended_query(&device, 21);
    device.wait_idle().expect("wait idle");

    // do_not_flush would normally be consulted first; assume_complete wins.
    let mut result = [0u8; 8];
    assert!(query.get_data(Some(&mut result), true, true).unwrap());
    assert_eq!(u64::from_ne_bytes(result), 21);
}

#[test]
fn test_readiness_without_destination() {
    let device = Arc::new(SoftDevice::new());
    let query = ended_query(&device, 1);

    assert!(!query.get_data(None, true, false).unwrap());
    device.wait_idle().expect("wait idle");
    assert!(query.get_data(None, true, false).unwrap());
}
