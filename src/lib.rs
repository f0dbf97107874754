//! Geodat - IP Geolocation From Sorted Range Tables
//!
//! Geodat resolves IPv4 and IPv6 addresses to country, region, city,
//! coordinates, time zone and metro data by binary-searching compact,
//! big-endian range tables held in memory. Data can be reloaded or
//! cleared at any time without interrupting concurrent lookups.
//!
//! # Quick Start
//!
//! ```rust
//! use geodat::builder::{DataSetBuilder, Location, RangeInfo};
//! use geodat::GeoIp;
//! use std::net::Ipv4Addr;
//!
//! // Write a tiny data set
//! let mut builder = DataSetBuilder::new();
//! let nyc = builder.add_location(Location {
//!     country: "US".into(),
//!     region: "NY".into(),
//!     metro: Some(501),
//!     eu: false,
//!     timezone: "America/New_York".into(),
//!     city: "New York".into(),
//! })?;
//! builder.add_ipv4_range(
//!     Ipv4Addr::new(72, 229, 0, 0),
//!     Ipv4Addr::new(72, 229, 255, 255),
//!     RangeInfo::located(nyc, 40.7, -74.0, 50),
//! )?;
//! # let dir = std::env::temp_dir().join(format!("geodat_doctest_{}", std::process::id()));
//! # std::fs::create_dir_all(&dir)?;
//! builder.build()?.write_to(&dir)?;
//!
//! // Load it and query
//! let geo = GeoIp::from_dir(&dir)?;
//! let record = geo.lookup("72.229.28.185").unwrap();
//! assert_eq!(record.city, "New York");
//! assert_eq!(record.metro, Some(501));
//! assert!(geo.lookup("192.168.1.1").is_none());
//! # std::fs::remove_dir_all(&dir)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Data Files
//!
//! Five headerless files are read from the data directory:
//!
//! ```text
//! geoip-city-names.dat   88 B/location   country, region, metro, eu, timezone, city
//! geoip-city.dat         24 B/range      IPv4 start, end, location id, lat, lon, area
//! geoip-city6.dat        48 B/range      IPv6 start, end, location id, lat, lon, area
//! geoip-country.dat      10 B/range      IPv4 start, end, country
//! geoip-country6.dat     34 B/range      IPv6 start, end, country
//! ```
//!
//! The city files are preferred; when they are missing or empty each
//! address family falls back to its country file.
//!
//! # Concurrency
//!
//! ```text
//!  reload ──build──▶ Snapshot (immutable) ──store──▶ ArcSwap ◀──load── lookups
//! ```
//!
//! Readers never lock. A snapshot lives as long as any lookup still holds
//! it, and a failed reload leaves the published one untouched.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod builder;
pub mod error;
pub mod format;
pub mod geoip;
pub mod lookup;
pub mod options;
pub mod snapshot;
pub mod table;
#[cfg(feature = "watch")]
pub mod watcher;

pub use crate::address::{normalize, pretty, AddressInput, NormalizedAddress};
pub use crate::builder::{DataSet, DataSetBuilder};
pub use crate::error::{BuildError, LoadError, TableError};
pub use crate::format::{DataFile, Layout};
pub use crate::geoip::GeoIp;
pub use crate::lookup::{AddressRange, GeoRecord};
pub use crate::options::GeoIpOptions;
pub use crate::snapshot::{Snapshot, SnapshotState};
pub use crate::table::LoadMode;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
