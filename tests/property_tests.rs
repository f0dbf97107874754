//! Property-based tests for normalization and range search

use geodat::address::{aton4, ntoa4};
use geodat::builder::{DataSetBuilder, RangeInfo};
use geodat::snapshot::{LoadOutcome, SnapshotSources};
use geodat::{normalize, pretty, AddressInput, DataFile, NormalizedAddress, Snapshot};
use proptest::prelude::*;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Sorted, non-overlapping ranges from (gap, length) pairs
fn layout_ranges(base: u128, spans: &[(u16, u16)]) -> Vec<(u128, u128)> {
    let mut ranges = Vec::with_capacity(spans.len());
    let mut next = base;
    for &(gap, len) in spans {
        let start = next + u128::from(gap);
        let end = start + u128::from(len);
        ranges.push((start, end));
        next = end + 1;
    }
    ranges
}

fn v4_snapshot(ranges: &[(u128, u128)]) -> Snapshot {
    let mut builder = DataSetBuilder::new();
    for &(start, end) in ranges {
        builder
            .add_ipv4_range(
                Ipv4Addr::from(start as u32),
                Ipv4Addr::from(end as u32),
                RangeInfo::country("XX"),
            )
            .unwrap();
    }
    let data = builder.build().unwrap();
    let sources = SnapshotSources::from_bytes(
        LoadOutcome::Legacy(data.bytes(DataFile::Country).to_vec().into()),
        LoadOutcome::Legacy(Vec::new().into()),
        None,
    );
    Snapshot::build(sources, 1, true).unwrap()
}

fn v6_snapshot(ranges: &[(u128, u128)]) -> Snapshot {
    let mut builder = DataSetBuilder::new();
    for &(start, end) in ranges {
        builder
            .add_ipv6_range(Ipv6Addr::from(start), Ipv6Addr::from(end), RangeInfo::country("XX"))
            .unwrap();
    }
    let data = builder.build().unwrap();
    let sources = SnapshotSources::from_bytes(
        LoadOutcome::Legacy(Vec::new().into()),
        LoadOutcome::Extended(data.bytes(DataFile::City6).to_vec().into()),
        Some(Vec::new()),
    );
    Snapshot::build(sources, 1, true).unwrap()
}

// 11.0.0.0, clear of every private block for the spans generated below
const V4_BASE: u128 = 0x0B00_0000;
const V6_BASE: u128 = 0x2001_0db8_0000_0000_0000_0000_0000_0000;

proptest! {
    #[test]
    fn test_dotted_decimal_round_trip(value in any::<u32>()) {
        let text = Ipv4Addr::from(value).to_string();
        prop_assert_eq!(aton4(&text), Some(value));
        prop_assert_eq!(pretty(value), text.clone());
        prop_assert_eq!(ntoa4(value), text);
    }

    #[test]
    fn test_ipv6_text_normalizes(value in any::<u128>()) {
        let addr = Ipv6Addr::from(value);
        let normalized = normalize(AddressInput::Text(&addr.to_string()));
        match addr.to_ipv4_mapped() {
            Some(v4) => prop_assert_eq!(normalized, NormalizedAddress::Ipv4(u32::from(v4))),
            None => prop_assert_eq!(normalized.as_u128(), Some(value)),
        }
    }

    #[test]
    fn test_normalize_never_panics(text in "\\PC{0,48}") {
        let _ = normalize(AddressInput::Text(&text));
    }

    #[test]
    fn test_v4_search_matches_linear_scan(
        spans in prop::collection::vec((0u16..512, 0u16..512), 1..64),
        probes in prop::collection::vec(0u32..0x0004_0000, 1..64),
    ) {
        let ranges = layout_ranges(V4_BASE, &spans);
        let snapshot = v4_snapshot(&ranges);
        // Probe around the table, including below the first range
        for offset in probes {
            let addr = (V4_BASE as u32 - 0x1000).wrapping_add(offset);
            let expected = ranges
                .iter()
                .find(|&&(s, e)| s <= u128::from(addr) && u128::from(addr) <= e);
            let found = snapshot.lookup(NormalizedAddress::Ipv4(addr));
            prop_assert_eq!(found.is_some(), expected.is_some(), "addr {}", addr);
            if let Some(record) = found {
                prop_assert!(record.range.contains(NormalizedAddress::Ipv4(addr)));
            }
        }
    }

    #[test]
    fn test_v6_search_matches_linear_scan(
        spans in prop::collection::vec((0u16..512, 0u16..512), 1..64),
        probes in prop::collection::vec(0u32..0x0004_0000, 1..64),
    ) {
        let ranges = layout_ranges(V6_BASE, &spans);
        let snapshot = v6_snapshot(&ranges);
        for offset in probes {
            let addr = V6_BASE - 0x1000 + u128::from(offset);
            let expected = ranges.iter().find(|&&(s, e)| s <= addr && addr <= e);
            let normalized = NormalizedAddress::Ipv6(geodat::address::u128_to_words(addr));
            let found = snapshot.lookup(normalized);
            prop_assert_eq!(found.is_some(), expected.is_some());
            if let Some(record) = found {
                prop_assert!(record.range.contains(normalized));
            }
        }
    }

    #[test]
    fn test_private_blocks_never_match(addr in prop_oneof![
        0x0A00_0000u32..=0x0AFF_FFFF,
        0xAC10_0000u32..=0xAC1F_FFFF,
        0xC0A8_0000u32..=0xC0A8_FFFF,
    ]) {
        // One range covering the whole address space
        let snapshot = v4_snapshot(&[(0, u128::from(u32::MAX))]);
        prop_assert!(snapshot.lookup(NormalizedAddress::Ipv4(addr)).is_none());
    }
}
