//! Instance rotation, capacity-exhaustion folding, and multi-counter
//! accumulation, driven through the software device.

use std::sync::Arc;

use gpumeter::cpu::SoftDevice;
use gpumeter::prelude::*;

/// Record one instance: sample `values` into the current slot, then move to
/// a fresh recording scope.
fn record(device: &SoftDevice, query: &mut Query, values: &[u64]) {
    device.set_counters(values);
    query.suspend();
    query.advance_instance().expect("advance_instance");
}

#[test]
fn test_sum_within_capacity() {
    let device = Arc::new(SoftDevice::new());
    let mut query = Query::new(device.clone(), QueryDesc::new(QueryKind::Occlusion))
        .expect("create query");

    for value in [7u64, 9, 13] {
        record(&device, &mut query, &[value]);
    }
    device.wait_idle().expect("wait idle");

    let mut result = [0u8; 8];
    assert!(query.get_data(Some(&mut result), false, false).unwrap());
    assert_eq!(u64::from_ne_bytes(result), 29);
}

#[test]
fn test_fold_on_capacity_exhaustion() {
    let device = Arc::new(SoftDevice::new());
    let desc = QueryDesc::new(QueryKind::Occlusion).with_capacity(4);
    let mut query = Query::new(device.clone(), desc).expect("create query");

    for value in [10u64, 20, 30, 40] {
        record(&device, &mut query, &[value]);
    }
    // The fourth advance ran out of instances: everything folded into the
    // baseline at instance 0 and rotation resumed from instance 1.
    record(&device, &mut query, &[5]);
    device.wait_idle().expect("wait idle");

    let mut result = [0u8; 8];
    assert!(query.get_data(Some(&mut result), false, false).unwrap());
    assert_eq!(u64::from_ne_bytes(result), 105);
}

#[test]
fn test_repeated_folds_match_direct_sum() {
    let device = Arc::new(SoftDevice::new());
    let desc = QueryDesc::new(QueryKind::Occlusion).with_capacity(3);
    let mut query = Query::new(device.clone(), desc).expect("create query");

    let values = [1u64, 2, 3, 4, 5, 6, 7];
    for value in values {
        record(&device, &mut query, &[value]);
    }
    device.wait_idle().expect("wait idle");

    let mut result = [0u8; 8];
    assert!(query.get_data(Some(&mut result), false, false).unwrap());
    assert_eq!(u64::from_ne_bytes(result), values.iter().sum::<u64>());
}

#[test]
fn test_pipeline_statistics_sum_all_counters() {
    let device = Arc::new(SoftDevice::new());
    let mut query = Query::new(
        device.clone(),
        QueryDesc::new(QueryKind::PipelineStatistics),
    )
    .expect("create query");

    let sample: Vec<u64> = (1..=11).collect();
    record(&device, &mut query, &sample);
    record(&device, &mut query, &sample);
    device.wait_idle().expect("wait idle");

    let mut result = [0u8; 88];
    assert!(query.get_data(Some(&mut result), false, false).unwrap());
    for (i, chunk) in result.chunks_exact(8).enumerate() {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        assert_eq!(u64::from_ne_bytes(word), 2 * (i as u64 + 1));
    }
}

#[test]
fn test_stream_output_statistics_layout() {
    let device = Arc::new(SoftDevice::new());
    let mut query = Query::new(
        device.clone(),
        QueryDesc::new(QueryKind::StreamOutputStatistics),
    )
    .expect("create query");

    record(&device, &mut query, &[3, 50]);
    record(&device, &mut query, &[4, 60]);
    device.wait_idle().expect("wait idle");

    let mut result = [0u8; 16];
    assert!(query.get_data(Some(&mut result), false, false).unwrap());
    let mut written = [0u8; 8];
    written.copy_from_slice(&result[..8]);
    let mut needed = [0u8; 8];
    needed.copy_from_slice(&result[8..]);
    assert_eq!(u64::from_ne_bytes(written), 7);
    assert_eq!(u64::from_ne_bytes(needed), 110);
}

#[test]
fn test_short_destination_is_invalid_argument() {
    let device = Arc::new(SoftDevice::new());
    let mut query = Query::new(device.clone(), QueryDesc::new(QueryKind::Occlusion))
        .expect("create query");
    record(&device, &mut query, &[1]);
    device.wait_idle().expect("wait idle");

    let mut result = [0xFFu8; 4];
    let err = query.get_data(Some(&mut result), false, false).unwrap_err();
    assert!(matches!(
        err,
        QueryError::DestinationTooSmall {
            required: 8,
            provided: 4,
        }
    ));
    assert_eq!(result, [0xFF; 4], "a failed read must not write");
}

#[test]
fn test_unissued_query_reads_zero() {
    let device = Arc::new(SoftDevice::new());
    let query = Query::new(device.clone(), QueryDesc::new(QueryKind::Occlusion))
        .expect("create query");

    // Never ended: epoch zero is complete by definition, and the sum over
    // zero instances is zero.
    let mut result = 7u64.to_ne_bytes();
    assert!(query.get_data(Some(&mut result), true, false).unwrap());
    assert_eq!(u64::from_ne_bytes(result), 0);
}

#[test]
fn test_drop_releases_through_deferred_paths() {
    let device = Arc::new(SoftDevice::new());
    let mut query = Query::new(device.clone(), QueryDesc::new(QueryKind::Occlusion))
        .expect("create query");
    record(&device, &mut query, &[1]);
    let used_epoch = device.current_epoch();
    drop(query);

    assert_eq!(device.released_slot_arrays().len(), 1);
    let regions = device.released_regions();
    assert_eq!(regions.len(), 1);
    assert_eq!(
        regions[0].1, used_epoch,
        "storage release carries the last epoch that used it"
    );
}
