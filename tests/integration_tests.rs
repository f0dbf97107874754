//! End-to-end lookups against data files on disk
//!
//! Each test writes a complete data directory with the builder, opens it
//! and checks lookups through the public API.

mod common;

use common::{fixture, fixture_dir, remove, write_raw};
use geodat::{
    pretty, AddressRange, DataFile, GeoIp, GeoIpOptions, Layout, LoadError, LoadMode, TableError,
};
use std::net::IpAddr;

fn open(dir: &tempfile::TempDir) -> GeoIp {
    GeoIp::from_dir(dir.path()).unwrap()
}

#[test]
fn test_warsaw() {
    let dir = fixture_dir();
    let geo = open(&dir);

    let record = geo.lookup("104.113.255.255").unwrap();
    assert_eq!(record.country, "PL");
    assert_eq!(record.region, "14");
    assert_eq!(record.eu, "1");
    assert!(record.is_eu());
    assert_eq!(record.timezone, "Europe/Warsaw");
    assert_eq!(record.city, "Warsaw");
    assert_eq!(record.metro, Some(0));
    assert_eq!(record.area, Some(100));
    assert_eq!(record.coordinates, Some((52.2297, 21.0122)));
}

#[test]
fn test_new_york() {
    let dir = fixture_dir();
    let geo = open(&dir);

    let record = geo.lookup("72.229.28.185").unwrap();
    assert_eq!(record.country, "US");
    assert_eq!(record.region, "NY");
    assert_eq!(record.eu, "0");
    assert_eq!(record.timezone, "America/New_York");
    assert_eq!(record.city, "New York");
    assert_eq!(record.metro, Some(501));
    assert_eq!(
        record.range,
        AddressRange::V4 {
            start: u32::from_be_bytes([72, 229, 0, 0]),
            end: u32::from_be_bytes([72, 229, 255, 255]),
        }
    );
}

#[test]
fn test_private_addresses_never_match() {
    let dir = fixture_dir();
    let geo = open(&dir);

    // Both blocks are present in the table
    assert!(geo.lookup("192.168.1.1").is_none());
    assert!(geo.lookup("10.0.0.1").is_none());
    assert!(geo.lookup("10.255.255.255").is_none());
}

#[test]
fn test_numeric_input() {
    let dir = fixture_dir();
    let geo = open(&dir);

    assert!(geo.lookup(0u32).is_none());
    let by_value = geo.lookup(16843009u32).unwrap();
    assert_eq!(pretty(16843009u32), "1.1.1.1");
    assert_eq!(Some(by_value), geo.lookup("1.1.1.1"));
    // Wider than 32 bits
    assert!(geo.lookup(1u64 << 40).is_none());
}

#[test]
fn test_sentinel_range() {
    let dir = fixture_dir();
    let geo = open(&dir);

    let record = geo.lookup("1.1.1.1").unwrap();
    assert_eq!(record.country, "");
    assert_eq!(record.city, "");
    assert_eq!(record.metro, None);
    assert_eq!(record.coordinates, Some((-33.494, 143.2104)));
    assert_eq!(record.area, Some(0));
}

#[test]
fn test_mapped_ipv6_resolves_as_ipv4() {
    let dir = fixture_dir();
    let geo = open(&dir);

    let direct = geo.lookup("1.1.1.1");
    assert!(direct.is_some());
    assert_eq!(geo.lookup("::ffff:1.1.1.1"), direct);
    assert_eq!(geo.lookup("::FFFF:1.1.1.1"), direct);
    assert_eq!(geo.lookup("0:0:0:0:0:FFFF:1.1.1.1"), direct);
    assert_eq!(geo.lookup_ip("::ffff:1.1.1.1".parse().unwrap()), direct);
}

#[test]
fn test_utf8_city() {
    let dir = fixture_dir();
    let geo = open(&dir);

    let record = geo.lookup("2.56.1.2").unwrap();
    assert_eq!(record.city, "Neumünster");
    assert_eq!(record.country, "DE");
}

#[test]
fn test_ipv6_lookup() {
    let dir = fixture_dir();
    let geo = open(&dir);

    let record = geo.lookup("2001:4860:4860::8888").unwrap();
    assert_eq!(record.country, "US");
    assert_eq!(record.city, "New York");
    assert_eq!(record.coordinates, Some((37.751, -97.822)));
    match record.range {
        AddressRange::V6 { start, end } => {
            assert_eq!(pretty(start), "[2001:4860::]");
            assert_eq!(pretty(end), "[2001:4860:ffff:ffff:ffff:ffff:ffff:ffff]");
        }
        AddressRange::V4 { .. } => panic!("expected IPv6 range"),
    }

    let ip: IpAddr = "2a02:2e0:3fe:1001:302::".parse().unwrap();
    assert_eq!(geo.lookup_ip(ip).unwrap().city, "Warsaw");

    assert!(geo.lookup("::1").is_none());
    assert!(geo.lookup("2001:4861::").is_none());
    assert!(geo.lookup("ffff::").is_none());
}

#[test]
fn test_invalid_input() {
    let dir = fixture_dir();
    let geo = open(&dir);

    for input in [
        "",
        "not an ip",
        "1.2.3",
        "1.2.3.4.5",
        "256.1.1.1",
        "1::2::3",
        "1:2:3:4:5:6:7:8:9",
        "[2001:4860::1]",
        "fe80::1%eth0",
    ] {
        assert!(geo.lookup(input).is_none(), "{input:?} should not match");
    }
}

#[test]
fn test_mmap_mode_matches_read_mode() {
    let dir = fixture_dir();
    let read = open(&dir);
    let mapped = GeoIp::open(GeoIpOptions::with_data_dir(dir.path()).load_mode(LoadMode::Mmap)).unwrap();

    for input in ["1.1.1.1", "72.229.28.185", "104.113.0.1", "2001:4860::1", "8.8.8.8"] {
        assert_eq!(read.lookup(input), mapped.lookup(input), "{input}");
    }
}

#[test]
fn test_ipv4_falls_back_without_city_names() {
    let dir = fixture_dir();
    remove(dir.path(), DataFile::CityNames);
    let geo = open(&dir);

    let snapshot = geo.snapshot();
    assert_eq!(snapshot.ipv4().layout(), Layout::Legacy);
    assert_eq!(snapshot.location_count(), 0);

    let record = geo.lookup("104.113.255.255").unwrap();
    assert_eq!(record.country, "PL");
    assert_eq!(record.city, "");
    assert_eq!(record.coordinates, None);
    assert_eq!(record.metro, None);
}

#[test]
fn test_empty_city_names_treated_as_missing() {
    let dir = fixture_dir();
    write_raw(dir.path(), DataFile::CityNames, &[]);
    let geo = open(&dir);

    assert_eq!(geo.snapshot().ipv4().layout(), Layout::Legacy);
    assert_eq!(geo.lookup("72.229.28.185").unwrap().country, "US");
}

#[test]
fn test_ipv4_falls_back_without_city_table() {
    let dir = fixture_dir();
    remove(dir.path(), DataFile::City);
    let geo = open(&dir);

    let snapshot = geo.snapshot();
    assert_eq!(snapshot.ipv4().layout(), Layout::Legacy);
    assert_eq!(snapshot.ipv6().layout(), Layout::Extended);
    assert_eq!(geo.lookup("72.229.28.185").unwrap().city, "");
    // IPv6 still dereferences the location table
    assert_eq!(geo.lookup("2001:4860::1").unwrap().city, "New York");
}

#[test]
fn test_ipv6_falls_back_without_city6() {
    let dir = fixture_dir();
    remove(dir.path(), DataFile::City6);
    let geo = open(&dir);

    let snapshot = geo.snapshot();
    assert_eq!(snapshot.ipv4().layout(), Layout::Extended);
    assert_eq!(snapshot.ipv6().layout(), Layout::Legacy);

    let record = geo.lookup("2a02:2e0::1").unwrap();
    assert_eq!(record.country, "PL");
    assert_eq!(record.city, "");
}

#[test]
fn test_extended_files_do_not_need_legacy() {
    let dir = fixture_dir();
    remove(dir.path(), DataFile::Country);
    remove(dir.path(), DataFile::Country6);
    let geo = open(&dir);
    assert_eq!(geo.lookup("104.113.0.1").unwrap().city, "Warsaw");
}

#[test]
fn test_missing_legacy_fallback_is_fatal() {
    let dir = fixture_dir();
    remove(dir.path(), DataFile::City);
    remove(dir.path(), DataFile::Country);

    let err = GeoIp::from_dir(dir.path()).unwrap_err();
    match err {
        LoadError::Io { path, source } => {
            assert!(path.ends_with("geoip-country.dat"));
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_partial_record_is_fatal() {
    let dir = fixture_dir();
    let mut bytes = fixture().bytes(DataFile::City).to_vec();
    bytes.truncate(bytes.len() - 3);
    write_raw(dir.path(), DataFile::City, &bytes);

    let err = GeoIp::from_dir(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Table {
            file: DataFile::City,
            source: TableError::PartialRecord { record_size: 24, .. },
        }
    ));
}

#[test]
fn test_strict_mode_rejects_unsorted_table() {
    let dir = fixture_dir();
    let bytes = fixture().bytes(DataFile::City).to_vec();
    // Swap the first two records
    let mut swapped = bytes[24..48].to_vec();
    swapped.extend_from_slice(&bytes[0..24]);
    swapped.extend_from_slice(&bytes[48..]);
    write_raw(dir.path(), DataFile::City, &swapped);

    assert!(GeoIp::from_dir(dir.path()).is_ok());

    let strict = GeoIpOptions::with_data_dir(dir.path()).strict(true);
    let err = GeoIp::open(strict).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid geoip-city.dat: record 1 does not start after the previous record ends"
    );
}

#[test]
fn test_fresh_snapshot_is_ordered() {
    let dir = fixture_dir();
    let geo = open(&dir);
    let snapshot = geo.snapshot();
    snapshot.validate().unwrap();
    assert_eq!(snapshot.ipv4().len(), 7);
    assert_eq!(snapshot.ipv6().len(), 2);
    assert_eq!(snapshot.location_count(), 3);
    assert_eq!(
        snapshot.ipv4().bounds(),
        Some((
            u32::from_be_bytes([1, 1, 1, 0]),
            u32::from_be_bytes([203, 0, 113, 255])
        ))
    );
}

#[test]
fn test_out_of_bounds() {
    let dir = fixture_dir();
    let geo = open(&dir);
    assert!(geo.lookup("1.1.0.255").is_none());
    assert!(geo.lookup("203.0.114.0").is_none());
    assert!(geo.lookup("255.255.255.255").is_none());
    assert!(geo.lookup("203.0.113.255").is_some());
}

/// Replace a data file with a directory so reading it fails with
/// something other than NotFound
fn make_unreadable(dir: &std::path::Path, file: DataFile) {
    remove(dir, file);
    std::fs::create_dir(dir.join(file.file_name())).unwrap();
}

#[test]
fn test_unreadable_extended_file_is_fatal() {
    for file in [DataFile::City, DataFile::CityNames, DataFile::City6] {
        let dir = fixture_dir();
        make_unreadable(dir.path(), file);

        match GeoIp::from_dir(dir.path()).unwrap_err() {
            LoadError::Io { path, source } => {
                assert!(path.ends_with(file.file_name()), "{}", path.display());
                assert_ne!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("{file}: unexpected error: {other}"),
        }
    }
}

#[test]
fn test_unreadable_extended_file_keeps_loaded_data() {
    for file in [DataFile::City, DataFile::CityNames] {
        let dir = fixture_dir();
        let geo = open(&dir);
        let generation = geo.generation();

        make_unreadable(dir.path(), file);
        assert!(matches!(geo.reload_data_sync(), Err(LoadError::Io { .. })));
        assert_eq!(geo.generation(), generation);
        assert_eq!(geo.lookup("72.229.28.185").unwrap().city, "New York");
    }
}
