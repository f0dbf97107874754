//! Shared fixtures for integration tests
#![allow(dead_code)]

use geodat::builder::{DataSetBuilder, Location, RangeInfo};
use geodat::{DataFile, DataSet};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use tempfile::TempDir;

fn location(country: &str, region: &str, metro: Option<i32>, eu: bool, tz: &str, city: &str) -> Location {
    Location {
        country: country.into(),
        region: region.into(),
        metro,
        eu,
        timezone: tz.into(),
        city: city.into(),
    }
}

fn v4(a: &str) -> Ipv4Addr {
    a.parse().unwrap()
}

fn v6(a: &str) -> Ipv6Addr {
    a.parse().unwrap()
}

/// The standard data set used across integration tests
pub fn fixture() -> DataSet {
    let mut b = DataSetBuilder::new();
    let warsaw = b
        .add_location(location("PL", "14", None, true, "Europe/Warsaw", "Warsaw"))
        .unwrap();
    let nyc = b
        .add_location(location("US", "NY", Some(501), false, "America/New_York", "New York"))
        .unwrap();
    let neumunster = b
        .add_location(location("DE", "SH", None, true, "Europe/Berlin", "Neumünster"))
        .unwrap();

    b.add_ipv4_range(v4("1.1.1.0"), v4("1.1.1.255"), RangeInfo::country("AU").with_coordinates(-33.494, 143.2104))
        .unwrap();
    b.add_ipv4_range(v4("2.56.0.0"), v4("2.56.255.255"), RangeInfo::located(neumunster, 54.0714, 9.99, 20))
        .unwrap();
    b.add_ipv4_range(v4("10.0.0.0"), v4("10.255.255.255"), RangeInfo::country("ZZ"))
        .unwrap();
    b.add_ipv4_range(v4("72.229.0.0"), v4("72.229.255.255"), RangeInfo::located(nyc, 40.7143, -74.006, 5))
        .unwrap();
    b.add_ipv4_range(v4("104.113.0.0"), v4("104.113.255.255"), RangeInfo::located(warsaw, 52.2297, 21.0122, 100))
        .unwrap();
    b.add_ipv4_range(v4("192.168.0.0"), v4("192.168.255.255"), RangeInfo::country("ZZ"))
        .unwrap();
    b.add_ipv4_range(v4("203.0.113.0"), v4("203.0.113.255"), RangeInfo::country("JP"))
        .unwrap();

    b.add_ipv6_range(v6("2001:4860::"), v6("2001:4860:ffff:ffff:ffff:ffff:ffff:ffff"), RangeInfo::located(nyc, 37.751, -97.822, 1000))
        .unwrap();
    b.add_ipv6_range(v6("2a02:2e0::"), v6("2a02:2e0:ffff:ffff:ffff:ffff:ffff:ffff"), RangeInfo::located(warsaw, 52.0, 21.0, 200))
        .unwrap();

    b.build().unwrap()
}

/// A second data set that moves 72.229.0.0/16 to Warsaw
///
/// Locations are added in the opposite order, so ids differ from
/// [`fixture`].
pub fn alternate_fixture() -> DataSet {
    let mut b = DataSetBuilder::new();
    let nyc = b
        .add_location(location("US", "NY", Some(501), false, "America/New_York", "New York"))
        .unwrap();
    let warsaw = b
        .add_location(location("PL", "14", None, true, "Europe/Warsaw", "Warsaw"))
        .unwrap();

    b.add_ipv4_range(v4("72.229.0.0"), v4("72.229.255.255"), RangeInfo::located(warsaw, 52.2297, 21.0122, 100))
        .unwrap();
    b.add_ipv4_range(v4("104.113.0.0"), v4("104.113.255.255"), RangeInfo::located(nyc, 40.7143, -74.006, 5))
        .unwrap();
    b.add_ipv6_range(v6("2001:4860::"), v6("2001:4860:ffff:ffff:ffff:ffff:ffff:ffff"), RangeInfo::located(warsaw, 52.0, 21.0, 200))
        .unwrap();

    b.build().unwrap()
}

/// A temp directory holding all five files of [`fixture`]
pub fn fixture_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fixture().write_to(dir.path()).unwrap();
    dir
}

/// Remove a data file from `dir`
pub fn remove(dir: &Path, file: DataFile) {
    std::fs::remove_file(dir.join(file.file_name())).unwrap();
}

/// Overwrite a data file with raw bytes
pub fn write_raw(dir: &Path, file: DataFile, bytes: &[u8]) {
    std::fs::write(dir.join(file.file_name()), bytes).unwrap();
}
