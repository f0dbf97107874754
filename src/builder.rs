//! Data file writer
//!
//! Produces the five bit-exact data files from in-memory ranges and
//! locations. Both layouts are written for each family, so a directory
//! written by [`DataSet::write_to`] serves extended lookups and still
//! works after the extended files are removed.
//!
//! # Example
//!
//! ```
//! use geodat::builder::{DataSetBuilder, Location, RangeInfo};
//! use std::net::Ipv4Addr;
//!
//! let mut builder = DataSetBuilder::new();
//! let warsaw = builder.add_location(Location {
//!     country: "PL".into(),
//!     region: "14".into(),
//!     metro: None,
//!     eu: true,
//!     timezone: "Europe/Warsaw".into(),
//!     city: "Warsaw".into(),
//! })?;
//! builder.add_ipv4_range(
//!     Ipv4Addr::new(104, 113, 0, 0),
//!     Ipv4Addr::new(104, 113, 255, 255),
//!     RangeInfo::located(warsaw, 52.2297, 21.0122, 100),
//! )?;
//! let data = builder.build()?;
//! assert_eq!(data.bytes(geodat::DataFile::City).len(), 24);
//! # Ok::<(), geodat::BuildError>(())
//! ```

use crate::error::BuildError;
use crate::format::{
    encode_text, u128_to_be_words, DataFile, ExtendedV4Record, ExtendedV6Record, LegacyV4Record,
    LegacyV6Record, LocationRecord, COORDINATE_SCALE, COUNTRY_WIDTH, NO_LOCATION,
};
use std::fs;
use std::io::Write;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use zerocopy::byteorder::big_endian::{I32, U32};
use zerocopy::IntoBytes;

/// Place detail written to the location table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Location {
    /// Two-letter country code
    pub country: String,
    /// Region code, at most three bytes
    pub region: String,
    /// Metro code; written as 0 when absent
    pub metro: Option<i32>,
    /// EU membership
    pub eu: bool,
    /// IANA time zone name
    pub timezone: String,
    /// City name, at most 46 bytes of UTF-8
    pub city: String,
}

/// What a range maps to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeInfo {
    /// Country for the legacy table; taken from the location when unset
    pub country: Option<String>,
    /// Location id returned by [`DataSetBuilder::add_location`]
    pub location: Option<u32>,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Accuracy radius
    pub area: u32,
}

impl RangeInfo {
    /// A range known only at country level
    pub fn country(code: impl Into<String>) -> Self {
        RangeInfo {
            country: Some(code.into()),
            ..Default::default()
        }
    }

    /// A range pointing at a location
    pub fn located(location: u32, latitude: f64, longitude: f64, area: u32) -> Self {
        RangeInfo {
            location: Some(location),
            latitude,
            longitude,
            area,
            ..Default::default()
        }
    }

    /// Set the inline coordinates
    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }
}

struct PendingRange<A> {
    start: A,
    end: A,
    info: RangeInfo,
}

/// Collects locations and ranges, then encodes every data file
#[derive(Default)]
pub struct DataSetBuilder {
    locations: Vec<LocationRecord>,
    ipv4: Vec<PendingRange<u32>>,
    ipv6: Vec<PendingRange<u128>>,
}

impl DataSetBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a location and return its id
    pub fn add_location(&mut self, location: Location) -> Result<u32, BuildError> {
        let eu = if location.eu { "1" } else { "0" };
        let record = LocationRecord {
            country: encode_field("country", &location.country)?,
            region: encode_field("region", &location.region)?,
            metro: I32::new(location.metro.unwrap_or(0)),
            eu: encode_field("eu", eu)?,
            timezone: encode_field("timezone", &location.timezone)?,
            city: encode_field("city", &location.city)?,
        };
        let id = u32::try_from(self.locations.len())
            .ok()
            .filter(|&id| id != NO_LOCATION)
            .ok_or(BuildError::UnknownLocation(NO_LOCATION))?;
        self.locations.push(record);
        Ok(id)
    }

    /// Add an inclusive IPv4 range
    pub fn add_ipv4_range(
        &mut self,
        start: Ipv4Addr,
        end: Ipv4Addr,
        info: RangeInfo,
    ) -> Result<&mut Self, BuildError> {
        if start > end {
            return Err(BuildError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        self.ipv4.push(PendingRange {
            start: u32::from(start),
            end: u32::from(end),
            info,
        });
        Ok(self)
    }

    /// Add an inclusive IPv6 range
    pub fn add_ipv6_range(
        &mut self,
        start: Ipv6Addr,
        end: Ipv6Addr,
        info: RangeInfo,
    ) -> Result<&mut Self, BuildError> {
        if start > end {
            return Err(BuildError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        self.ipv6.push(PendingRange {
            start: u128::from(start),
            end: u128::from(end),
            info,
        });
        Ok(self)
    }

    /// Number of locations added so far
    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    /// Sort, validate and encode everything
    pub fn build(&self) -> Result<DataSet, BuildError> {
        let ipv4 = self.sorted(&self.ipv4, |a| Ipv4Addr::from(a).to_string())?;
        let ipv6 = self.sorted(&self.ipv6, |a| Ipv6Addr::from(a).to_string())?;

        let mut data = DataSet::default();

        for range in &ipv4 {
            let country = self.legacy_country(&range.info, || Ipv4Addr::from(range.start).to_string())?;
            let legacy = LegacyV4Record {
                start: U32::new(range.start),
                end: U32::new(range.end),
                country,
            };
            data.country.extend_from_slice(legacy.as_bytes());

            let (location_id, latitude, longitude, area) = extended_fields(&range.info);
            let extended = ExtendedV4Record {
                start: U32::new(range.start),
                end: U32::new(range.end),
                location_id,
                latitude,
                longitude,
                area,
            };
            data.city.extend_from_slice(extended.as_bytes());
        }

        for range in &ipv6 {
            let country = self.legacy_country(&range.info, || Ipv6Addr::from(range.start).to_string())?;
            let legacy = LegacyV6Record {
                start: u128_to_be_words(range.start),
                end: u128_to_be_words(range.end),
                country,
            };
            data.country6.extend_from_slice(legacy.as_bytes());

            let (location_id, latitude, longitude, area) = extended_fields(&range.info);
            let extended = ExtendedV6Record {
                start: u128_to_be_words(range.start),
                end: u128_to_be_words(range.end),
                location_id,
                latitude,
                longitude,
                area,
            };
            data.city6.extend_from_slice(extended.as_bytes());
        }

        for location in &self.locations {
            data.city_names.extend_from_slice(location.as_bytes());
        }

        Ok(data)
    }

    /// Sorted copy of `ranges`, rejecting overlaps and dangling location ids
    fn sorted<'a, A: Copy + Ord>(
        &self,
        ranges: &'a [PendingRange<A>],
        show: impl Fn(A) -> String,
    ) -> Result<Vec<&'a PendingRange<A>>, BuildError> {
        let mut sorted: Vec<&PendingRange<A>> = ranges.iter().collect();
        sorted.sort_by_key(|r| r.start);

        for (i, range) in sorted.iter().enumerate() {
            if let Some(id) = range.info.location {
                if id as usize >= self.locations.len() {
                    return Err(BuildError::UnknownLocation(id));
                }
            }
            if i > 0 && sorted[i - 1].end >= range.start {
                return Err(BuildError::Overlap {
                    start: show(range.start),
                });
            }
        }
        Ok(sorted)
    }

    fn legacy_country(
        &self,
        info: &RangeInfo,
        start: impl FnOnce() -> String,
    ) -> Result<[u8; COUNTRY_WIDTH], BuildError> {
        if let Some(code) = &info.country {
            return encode_field("country", code);
        }
        info.location
            .and_then(|id| self.locations.get(id as usize))
            .map(|location| location.country)
            .filter(|country| country[0] != 0)
            .ok_or_else(|| BuildError::MissingCountry { start: start() })
    }
}

fn encode_field<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N], BuildError> {
    encode_text(value).ok_or_else(|| BuildError::FieldTooLong {
        field,
        value: value.to_string(),
        width: N,
    })
}

fn scale(degrees: f64) -> I32 {
    I32::new((degrees * COORDINATE_SCALE).round() as i32)
}

fn extended_fields(info: &RangeInfo) -> (U32, I32, I32, U32) {
    (
        U32::new(info.location.unwrap_or(NO_LOCATION)),
        scale(info.latitude),
        scale(info.longitude),
        U32::new(info.area),
    )
}

/// Encoded contents of all five data files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSet {
    country: Vec<u8>,
    country6: Vec<u8>,
    city: Vec<u8>,
    city6: Vec<u8>,
    city_names: Vec<u8>,
}

impl DataSet {
    /// Encoded bytes of one file
    pub fn bytes(&self, file: DataFile) -> &[u8] {
        match file {
            DataFile::Country => &self.country,
            DataFile::Country6 => &self.country6,
            DataFile::City => &self.city,
            DataFile::City6 => &self.city6,
            DataFile::CityNames => &self.city_names,
        }
    }

    /// Write all five files into `dir`
    pub fn write_to(&self, dir: &Path) -> Result<(), BuildError> {
        for file in DataFile::ALL {
            self.write_file(dir, file)?;
        }
        Ok(())
    }

    /// Write one file into `dir`
    ///
    /// The bytes go to a temporary sibling first and are renamed into
    /// place, so a memory-mapped reader of the old file is never disturbed.
    pub fn write_file(&self, dir: &Path, file: DataFile) -> Result<(), BuildError> {
        let target = dir.join(file.file_name());
        let tmp = dir.join(format!(".{}.tmp", file.file_name()));
        {
            let mut out = fs::File::create(&tmp)?;
            out.write_all(self.bytes(file))?;
            out.sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        Ok(())
    }
}
