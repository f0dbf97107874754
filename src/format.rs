//! Binary format structures for geodat data files
//!
//! Five files make up one data set. Each file is a flat array of
//! fixed-size records with no header; all multi-byte integers are
//! big-endian.
//!
//! # Range tables
//!
//! | File | Record | Layout |
//! |---|---|---|
//! | `geoip-country.dat`  | 10 B | start u32, end u32, country 2B |
//! | `geoip-country6.dat` | 34 B | start 4×u32, end 4×u32, country 2B |
//! | `geoip-city.dat`     | 24 B | start u32, end u32, location u32, lat i32, lon i32, area u32 |
//! | `geoip-city6.dat`    | 48 B | start 4×u32, end 4×u32, location u32, lat i32, lon i32, area u32 |
//!
//! Records within a table are sorted by start address and never overlap.
//! Coordinates are stored as degrees × 10 000.
//!
//! # Location table
//!
//! `geoip-city-names.dat` holds 88-byte [`LocationRecord`]s addressed by
//! index (`location_id * 88`). The same table serves both address families.
//! Text fields are left-justified and NUL-padded; a value ends at the
//! first NUL byte or at the field width.
//!
//! All structures are `Unaligned`, so they can be viewed in place from
//! any byte buffer, including a memory map.

use std::fmt;
use zerocopy::byteorder::big_endian::{I32, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Legacy IPv4 record size in bytes
pub const LEGACY_V4_RECORD_SIZE: usize = 10;

/// Legacy IPv6 record size in bytes
pub const LEGACY_V6_RECORD_SIZE: usize = 34;

/// Extended IPv4 record size in bytes
pub const EXTENDED_V4_RECORD_SIZE: usize = 24;

/// Extended IPv6 record size in bytes
pub const EXTENDED_V6_RECORD_SIZE: usize = 48;

/// Location record size in bytes
pub const LOCATION_RECORD_SIZE: usize = 88;

/// Location id meaning "range matched but no location detail"
pub const NO_LOCATION: u32 = u32::MAX;

/// Fixed-point scale of stored coordinates
pub const COORDINATE_SCALE: f64 = 10_000.0;

/// Width of the country field
pub const COUNTRY_WIDTH: usize = 2;
/// Width of the region field
pub const REGION_WIDTH: usize = 3;
/// Width of the EU flag field
pub const EU_WIDTH: usize = 1;
/// Width of the timezone field
pub const TIMEZONE_WIDTH: usize = 32;
/// Width of the city field
pub const CITY_WIDTH: usize = 46;

/// The data files consumed from the data directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFile {
    /// Legacy IPv4 table
    Country,
    /// Legacy IPv6 table
    Country6,
    /// Extended IPv4 table
    City,
    /// Extended IPv6 table
    City6,
    /// Location table
    CityNames,
}

impl DataFile {
    /// Every data file, in load order
    pub const ALL: [DataFile; 5] = [
        DataFile::CityNames,
        DataFile::City,
        DataFile::Country,
        DataFile::City6,
        DataFile::Country6,
    ];

    /// File name inside the data directory
    pub const fn file_name(self) -> &'static str {
        match self {
            DataFile::Country => "geoip-country.dat",
            DataFile::Country6 => "geoip-country6.dat",
            DataFile::City => "geoip-city.dat",
            DataFile::City6 => "geoip-city6.dat",
            DataFile::CityNames => "geoip-city-names.dat",
        }
    }

    /// Record size of this file's layout
    pub const fn record_size(self) -> usize {
        match self {
            DataFile::Country => LEGACY_V4_RECORD_SIZE,
            DataFile::Country6 => LEGACY_V6_RECORD_SIZE,
            DataFile::City => EXTENDED_V4_RECORD_SIZE,
            DataFile::City6 => EXTENDED_V6_RECORD_SIZE,
            DataFile::CityNames => LOCATION_RECORD_SIZE,
        }
    }

    /// Look up a data file by its file name
    pub fn from_file_name(name: &str) -> Option<DataFile> {
        DataFile::ALL.into_iter().find(|f| f.file_name() == name)
    }
}

impl fmt::Display for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Record layout of a range table
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Country-only records
    Legacy,
    /// Records with location id, coordinates and area
    Extended,
}

// ============================================================================
// Range records
// ============================================================================

/// Legacy IPv4 range (10 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct LegacyV4Record {
    /// First address in the range
    pub start: U32,
    /// Last address in the range
    pub end: U32,
    /// ISO country code
    pub country: [u8; COUNTRY_WIDTH],
}

/// Extended IPv4 range (24 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ExtendedV4Record {
    /// First address in the range
    pub start: U32,
    /// Last address in the range
    pub end: U32,
    /// Index into the location table, or [`NO_LOCATION`]
    pub location_id: U32,
    /// Latitude × 10 000
    pub latitude: I32,
    /// Longitude × 10 000
    pub longitude: I32,
    /// Accuracy radius
    pub area: U32,
}

/// Legacy IPv6 range (34 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct LegacyV6Record {
    /// First address, four big-endian 32-bit words
    pub start: [U32; 4],
    /// Last address, four big-endian 32-bit words
    pub end: [U32; 4],
    /// ISO country code
    pub country: [u8; COUNTRY_WIDTH],
}

/// Extended IPv6 range (48 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ExtendedV6Record {
    /// First address, four big-endian 32-bit words
    pub start: [U32; 4],
    /// Last address, four big-endian 32-bit words
    pub end: [U32; 4],
    /// Index into the location table, or [`NO_LOCATION`]
    pub location_id: U32,
    /// Latitude × 10 000
    pub latitude: I32,
    /// Longitude × 10 000
    pub longitude: I32,
    /// Accuracy radius
    pub area: U32,
}

/// Location detail (88 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct LocationRecord {
    /// ISO country code
    pub country: [u8; COUNTRY_WIDTH],
    /// Region / subdivision code
    pub region: [u8; REGION_WIDTH],
    /// Metro code (0 when unknown)
    pub metro: I32,
    /// `'1'` inside the EU, `'0'` otherwise
    pub eu: [u8; EU_WIDTH],
    /// IANA timezone name
    pub timezone: [u8; TIMEZONE_WIDTH],
    /// City name, UTF-8
    pub city: [u8; CITY_WIDTH],
}

const _: () = assert!(std::mem::size_of::<LegacyV4Record>() == LEGACY_V4_RECORD_SIZE);
const _: () = assert!(std::mem::size_of::<ExtendedV4Record>() == EXTENDED_V4_RECORD_SIZE);
const _: () = assert!(std::mem::size_of::<LegacyV6Record>() == LEGACY_V6_RECORD_SIZE);
const _: () = assert!(std::mem::size_of::<ExtendedV6Record>() == EXTENDED_V6_RECORD_SIZE);
const _: () = assert!(std::mem::size_of::<LocationRecord>() == LOCATION_RECORD_SIZE);

/// Common view over range records of either family and layout
///
/// `Addr` is the numeric form used for ordering: `u32` for IPv4 and the
/// full 128-bit value for IPv6.
pub trait RangeRecord: FromBytes + KnownLayout + Immutable + Unaligned {
    /// Numeric address type
    type Addr: Copy + Ord + fmt::Debug;

    /// Layout this record belongs to
    const RECORD_LAYOUT: Layout;

    /// First address in the range
    fn start(&self) -> Self::Addr;

    /// Last address in the range
    fn end(&self) -> Self::Addr;
}

/// Records carrying location id, coordinates and area
pub trait ExtendedFields {
    /// Location id, possibly [`NO_LOCATION`]
    fn location_id(&self) -> u32;
    /// Raw latitude × 10 000
    fn latitude(&self) -> i32;
    /// Raw longitude × 10 000
    fn longitude(&self) -> i32;
    /// Accuracy radius
    fn area(&self) -> u32;
}

#[inline]
fn be_words_to_u128(words: &[U32; 4]) -> u128 {
    words
        .iter()
        .fold(0u128, |acc, w| (acc << 32) | u128::from(w.get()))
}

/// Split a 128-bit address into big-endian words
#[inline]
pub fn u128_to_be_words(value: u128) -> [U32; 4] {
    [
        U32::new((value >> 96) as u32),
        U32::new((value >> 64) as u32),
        U32::new((value >> 32) as u32),
        U32::new(value as u32),
    ]
}

impl RangeRecord for LegacyV4Record {
    type Addr = u32;
    const RECORD_LAYOUT: Layout = Layout::Legacy;

    #[inline]
    fn start(&self) -> u32 {
        self.start.get()
    }

    #[inline]
    fn end(&self) -> u32 {
        self.end.get()
    }
}

impl RangeRecord for ExtendedV4Record {
    type Addr = u32;
    const RECORD_LAYOUT: Layout = Layout::Extended;

    #[inline]
    fn start(&self) -> u32 {
        self.start.get()
    }

    #[inline]
    fn end(&self) -> u32 {
        self.end.get()
    }
}

impl RangeRecord for LegacyV6Record {
    type Addr = u128;
    const RECORD_LAYOUT: Layout = Layout::Legacy;

    #[inline]
    fn start(&self) -> u128 {
        be_words_to_u128(&self.start)
    }

    #[inline]
    fn end(&self) -> u128 {
        be_words_to_u128(&self.end)
    }
}

impl RangeRecord for ExtendedV6Record {
    type Addr = u128;
    const RECORD_LAYOUT: Layout = Layout::Extended;

    #[inline]
    fn start(&self) -> u128 {
        be_words_to_u128(&self.start)
    }

    #[inline]
    fn end(&self) -> u128 {
        be_words_to_u128(&self.end)
    }
}

macro_rules! impl_extended_fields {
    ($($record:ty),*) => {
        $(
            impl ExtendedFields for $record {
                #[inline]
                fn location_id(&self) -> u32 {
                    self.location_id.get()
                }

                #[inline]
                fn latitude(&self) -> i32 {
                    self.latitude.get()
                }

                #[inline]
                fn longitude(&self) -> i32 {
                    self.longitude.get()
                }

                #[inline]
                fn area(&self) -> u32 {
                    self.area.get()
                }
            }
        )*
    };
}

impl_extended_fields!(ExtendedV4Record, ExtendedV6Record);

/// Slice a fixed-width text field at its first NUL byte
#[inline]
pub fn trim_nul(field: &[u8]) -> &[u8] {
    match memchr::memchr(0, field) {
        Some(pos) => &field[..pos],
        None => field,
    }
}

/// Decode a fixed-width text field
///
/// Invalid UTF-8 (e.g. a city name cut mid-character by the field width)
/// is replaced rather than rejected.
pub fn decode_text(field: &[u8]) -> String {
    String::from_utf8_lossy(trim_nul(field)).into_owned()
}

/// Encode `value` into a NUL-padded field of width `N`
///
/// Returns `None` if the value does not fit.
pub fn encode_text<const N: usize>(value: &str) -> Option<[u8; N]> {
    let bytes = value.as_bytes();
    if bytes.len() > N {
        return None;
    }
    let mut field = [0u8; N];
    field[..bytes.len()].copy_from_slice(bytes);
    Some(field)
}
