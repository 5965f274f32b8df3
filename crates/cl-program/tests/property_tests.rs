//! Property-based tests for log-device resolution and option rendering.

use std::collections::HashSet;

use cl_program::diagnostics::resolve_log_devices;
use cl_program::{BuildConfig, Device, DeviceId, StatusError};
use proptest::prelude::*;

fn devices(raw: &[usize]) -> Vec<Device> {
    raw.iter().map(|&r| Device::new(DeviceId::from_raw(r))).collect()
}

fn raw_ids(devices: &[Device]) -> Vec<usize> {
    devices.iter().map(|d| d.id().as_raw()).collect()
}

/// Reference model: first occurrence of each non-null id, in input order.
fn first_occurrences(raw: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut seen = HashSet::new();
    raw.into_iter().filter(|&r| r != 0 && seen.insert(r)).collect()
}

proptest! {
    #[test]
    fn resolution_matches_first_occurrence_model(
        requested in prop::collection::vec(0usize..8, 0..12),
        cached in prop::collection::vec(0usize..8, 0..12),
        discovered in prop::collection::vec(0usize..8, 0..12),
    ) {
        let resolved = resolve_log_devices(&devices(&requested), &devices(&cached), || Ok(devices(&discovered)))
            .unwrap();

        let union = first_occurrences(requested.iter().chain(cached.iter()).copied());
        let expected = if union.is_empty() { first_occurrences(discovered.iter().copied()) } else { union };
        prop_assert_eq!(raw_ids(&resolved), expected);
    }

    #[test]
    fn resolved_devices_are_unique_and_non_null(
        requested in prop::collection::vec(0usize..16, 0..20),
        cached in prop::collection::vec(0usize..16, 0..20),
    ) {
        let resolved = resolve_log_devices(&devices(&requested), &devices(&cached), || Ok(Vec::new())).unwrap();
        let ids = raw_ids(&resolved);
        let unique: HashSet<usize> = ids.iter().copied().collect();
        prop_assert_eq!(unique.len(), ids.len());
        prop_assert!(ids.iter().all(|&r| r != 0));
    }

    #[test]
    fn discovery_is_skipped_when_union_has_devices(
        requested in prop::collection::vec(1usize..8, 1..6),
    ) {
        let resolved = resolve_log_devices(&devices(&requested), &[], || Err(StatusError::OutOfHostMemory));
        prop_assert!(resolved.is_ok());
    }

    #[test]
    fn options_string_keeps_raw_option_order(
        options in prop::collection::vec("-[a-z]{1,8}", 0..6),
    ) {
        let cfg = options.iter().fold(BuildConfig::new(), |cfg, o| cfg.option(o.clone()));
        prop_assert_eq!(cfg.options_string(), options.join(" "));
    }
}
