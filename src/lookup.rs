//! Range lookup and record decoding
//!
//! A lookup runs entirely against one [`Snapshot`]: reject addresses
//! outside the table bounds, reject RFC 1918 IPv4 space, bisect for the
//! containing record, then decode it. Extended records carry a location
//! id that is resolved through the snapshot's location table; legacy
//! records carry only a country code.

use crate::address::{is_private_v4, u128_to_words, words_to_u128, NormalizedAddress};
use crate::format::{
    decode_text, ExtendedFields, LegacyV4Record, LegacyV6Record, LocationRecord, RangeRecord,
    COORDINATE_SCALE, NO_LOCATION,
};
use crate::snapshot::{Ranges, Snapshot};
use crate::table::LocationTable;
use serde::{Deserialize, Serialize};

/// Address interval of a matched record, in its family's units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum AddressRange {
    /// IPv4 interval as address values
    V4 {
        /// First address
        start: u32,
        /// Last address, inclusive
        end: u32,
    },
    /// IPv6 interval as big-endian 32-bit words
    V6 {
        /// First address
        start: [u32; 4],
        /// Last address, inclusive
        end: [u32; 4],
    },
}

impl AddressRange {
    /// Whether `addr` lies within this interval
    ///
    /// Addresses of the other family are never contained.
    pub fn contains(&self, addr: NormalizedAddress) -> bool {
        match (*self, addr) {
            (AddressRange::V4 { start, end }, NormalizedAddress::Ipv4(a)) => start <= a && a <= end,
            (AddressRange::V6 { start, end }, NormalizedAddress::Ipv6(words)) => {
                let a = words_to_u128(words);
                words_to_u128(start) <= a && a <= words_to_u128(end)
            }
            _ => false,
        }
    }
}

/// Geographic data for one matched address range
///
/// Text fields are empty when the matched record carries no location
/// detail. `eu` is `"1"` for EU member states, `"0"` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// Interval of the matched record
    pub range: AddressRange,
    /// ISO 3166-1 alpha-2 country code
    pub country: String,
    /// Region or subdivision code
    pub region: String,
    /// EU membership flag as stored
    pub eu: String,
    /// IANA time zone name
    pub timezone: String,
    /// City name
    pub city: String,
    /// `(latitude, longitude)` in degrees; extended layout only
    pub coordinates: Option<(f64, f64)>,
    /// Metro code; set when location detail is present
    pub metro: Option<i32>,
    /// Accuracy radius; extended layout only
    pub area: Option<u32>,
}

impl GeoRecord {
    fn bare(range: AddressRange) -> Self {
        GeoRecord {
            range,
            country: String::new(),
            region: String::new(),
            eu: String::new(),
            timezone: String::new(),
            city: String::new(),
            coordinates: None,
            metro: None,
            area: None,
        }
    }

    /// Whether the location is flagged as an EU member state
    pub fn is_eu(&self) -> bool {
        self.eu == "1"
    }

    fn legacy(range: AddressRange, country: &[u8]) -> Self {
        GeoRecord {
            country: decode_text(country),
            ..GeoRecord::bare(range)
        }
    }

    fn extended<R: ExtendedFields>(range: AddressRange, record: &R, locations: &LocationTable) -> Self {
        let mut geo = GeoRecord {
            coordinates: Some((
                f64::from(record.latitude()) / COORDINATE_SCALE,
                f64::from(record.longitude()) / COORDINATE_SCALE,
            )),
            area: Some(record.area()),
            ..GeoRecord::bare(range)
        };

        let id = record.location_id();
        if id != NO_LOCATION {
            if let Some(location) = locations.get(id) {
                geo.apply_location(location);
            }
        }
        geo
    }

    fn apply_location(&mut self, location: &LocationRecord) {
        self.country = decode_text(&location.country);
        self.region = decode_text(&location.region);
        self.metro = Some(location.metro.get());
        self.eu = decode_text(&location.eu);
        self.timezone = decode_text(&location.timezone);
        self.city = decode_text(&location.city);
    }
}

impl Snapshot {
    /// Find the record containing `addr`
    ///
    /// Returns `None` for invalid input, addresses outside the table,
    /// private IPv4 addresses and addresses falling in a gap.
    pub fn lookup(&self, addr: NormalizedAddress) -> Option<GeoRecord> {
        match addr {
            NormalizedAddress::Ipv4(a) => self.lookup_v4(a),
            NormalizedAddress::Ipv6(words) => self.lookup_v6(words_to_u128(words)),
            NormalizedAddress::Invalid => None,
        }
    }

    fn lookup_v4(&self, addr: u32) -> Option<GeoRecord> {
        match &self.ipv4 {
            Ranges::Legacy(table) => {
                if !table.in_bounds(addr) || is_private_v4(addr) {
                    return None;
                }
                let record: &LegacyV4Record = table.find(addr)?;
                Some(GeoRecord::legacy(v4_range(record), &record.country))
            }
            Ranges::Extended(table) => {
                if !table.in_bounds(addr) || is_private_v4(addr) {
                    return None;
                }
                let record = table.find(addr)?;
                Some(GeoRecord::extended(
                    v4_range(record),
                    record,
                    &self.locations,
                ))
            }
        }
    }

    fn lookup_v6(&self, addr: u128) -> Option<GeoRecord> {
        match &self.ipv6 {
            Ranges::Legacy(table) => {
                if !table.in_bounds(addr) {
                    return None;
                }
                let record: &LegacyV6Record = table.find(addr)?;
                Some(GeoRecord::legacy(v6_range(record), &record.country))
            }
            Ranges::Extended(table) => {
                if !table.in_bounds(addr) {
                    return None;
                }
                let record = table.find(addr)?;
                Some(GeoRecord::extended(
                    v6_range(record),
                    record,
                    &self.locations,
                ))
            }
        }
    }
}

fn v4_range<R: RangeRecord<Addr = u32>>(record: &R) -> AddressRange {
    AddressRange::V4 {
        start: record.start(),
        end: record.end(),
    }
}

fn v6_range<R: RangeRecord<Addr = u128>>(record: &R) -> AddressRange {
    AddressRange::V6 {
        start: u128_to_words(record.start()),
        end: u128_to_words(record.end()),
    }
}
