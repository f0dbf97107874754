//! Immutable data generations
//!
//! A [`Snapshot`] bundles the IPv4 table, the IPv6 table and the shared
//! location table loaded from one pass over the data directory. It is
//! fully built before anyone can see it and never changes afterwards;
//! replacing data means building a new snapshot and publishing it.
//!
//! # Source resolution
//!
//! Each address family prefers its extended (city-level) file and falls
//! back to the legacy (country-level) file:
//!
//! ```text
//! IPv4:  geoip-city-names.dat + geoip-city.dat  ──missing/empty──▶  geoip-country.dat
//! IPv6:  geoip-city6.dat                        ──missing/empty──▶  geoip-country6.dat
//! ```
//!
//! Absence is an expected outcome, not an error. Any other I/O failure,
//! including a missing legacy file, aborts the build.

use crate::error::{LoadError, Result, TableError};
use crate::format::{
    DataFile, ExtendedV4Record, ExtendedV6Record, Layout, LegacyV4Record, LegacyV6Record,
    RangeRecord,
};
use crate::options::GeoIpOptions;
use crate::table::{LocationTable, RangeTable, TableBytes};
use tracing::debug;

/// Result of resolving one address family's table
#[derive(Debug)]
pub enum LoadOutcome {
    /// Extended file present and non-empty
    Extended(TableBytes),
    /// Extended file absent; legacy file read instead
    Legacy(TableBytes),
    /// Unrecoverable read failure
    Fatal(LoadError),
}

/// Raw inputs to [`Snapshot::build`]
#[derive(Debug)]
pub struct SnapshotSources {
    /// IPv4 range table
    pub ipv4: LoadOutcome,
    /// IPv6 range table
    pub ipv6: LoadOutcome,
    /// Location table; `None` when the IPv4 side fell back to legacy
    /// before reading it, or when nothing references it
    pub locations: Option<TableBytes>,
}

/// Where a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    /// Initial placeholder; no load has been attempted or succeeded
    Unloaded,
    /// Published by `clear()`
    Cleared,
    /// Built from data files
    Loaded,
}

/// IPv4 or IPv6 range table in either layout
pub enum Ranges<L: RangeRecord, E: RangeRecord> {
    /// Country-only table
    Legacy(RangeTable<L>),
    /// Table with location indirection
    Extended(RangeTable<E>),
}

/// IPv4 ranges
pub type Ipv4Ranges = Ranges<LegacyV4Record, ExtendedV4Record>;

/// IPv6 ranges
pub type Ipv6Ranges = Ranges<LegacyV6Record, ExtendedV6Record>;

impl<L, E> Ranges<L, E>
where
    L: RangeRecord,
    E: RangeRecord<Addr = L::Addr>,
{
    fn from_outcome(outcome: LoadOutcome, legacy: DataFile, extended: DataFile) -> Result<Self> {
        match outcome {
            LoadOutcome::Extended(bytes) => RangeTable::new(bytes)
                .map(Ranges::Extended)
                .map_err(|source| LoadError::Table {
                    file: extended,
                    source,
                }),
            LoadOutcome::Legacy(bytes) => RangeTable::new(bytes)
                .map(Ranges::Legacy)
                .map_err(|source| LoadError::Table {
                    file: legacy,
                    source,
                }),
            LoadOutcome::Fatal(err) => Err(err),
        }
    }

    fn empty() -> Self {
        Ranges::Legacy(RangeTable::empty())
    }

    /// Record layout of this table
    pub fn layout(&self) -> Layout {
        match self {
            Ranges::Legacy(_) => Layout::Legacy,
            Ranges::Extended(_) => Layout::Extended,
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        match self {
            Ranges::Legacy(t) => t.len(),
            Ranges::Extended(t) => t.len(),
        }
    }

    /// Whether the table has no records
    pub fn is_empty(&self) -> bool {
        self.bounds().is_none()
    }

    /// `(first start, last end)`, or `None` when empty
    pub fn bounds(&self) -> Option<(L::Addr, L::Addr)> {
        match self {
            Ranges::Legacy(t) => t.bounds(),
            Ranges::Extended(t) => t.bounds(),
        }
    }

    fn check_ordering(&self) -> std::result::Result<(), TableError> {
        match self {
            Ranges::Legacy(t) => t.check_ordering(),
            Ranges::Extended(t) => t.check_ordering(),
        }
    }
}

/// One immutable, internally consistent generation of loaded tables
pub struct Snapshot {
    generation: u64,
    state: SnapshotState,
    pub(crate) ipv4: Ipv4Ranges,
    pub(crate) ipv6: Ipv6Ranges,
    pub(crate) locations: LocationTable,
}

impl Snapshot {
    /// The never-loaded placeholder
    pub fn unloaded() -> Self {
        Self::empty(0, SnapshotState::Unloaded)
    }

    /// An empty snapshot published by `clear()`
    pub fn cleared(generation: u64) -> Self {
        Self::empty(generation, SnapshotState::Cleared)
    }

    fn empty(generation: u64, state: SnapshotState) -> Self {
        Snapshot {
            generation,
            state,
            ipv4: Ranges::empty(),
            ipv6: Ranges::empty(),
            locations: LocationTable::empty(),
        }
    }

    /// Read the data directory and build a snapshot
    pub fn load(options: &GeoIpOptions, generation: u64) -> Result<Self> {
        let sources = SnapshotSources::from_options(options);
        Self::build(sources, generation, options.strict)
    }

    /// Build a snapshot from already-resolved sources
    ///
    /// With `strict`, every range table must pass
    /// [`Snapshot::validate`] or the build fails.
    pub fn build(sources: SnapshotSources, generation: u64, strict: bool) -> Result<Self> {
        let ipv4 = Ipv4Ranges::from_outcome(sources.ipv4, DataFile::Country, DataFile::City)?;
        let ipv6 = Ipv6Ranges::from_outcome(sources.ipv6, DataFile::Country6, DataFile::City6)?;
        let locations = match sources.locations {
            Some(bytes) => LocationTable::new(bytes).map_err(|source| LoadError::Table {
                file: DataFile::CityNames,
                source,
            })?,
            None => LocationTable::empty(),
        };

        let snapshot = Snapshot {
            generation,
            state: SnapshotState::Loaded,
            ipv4,
            ipv6,
            locations,
        };
        if strict {
            snapshot.validate()?;
        }
        Ok(snapshot)
    }

    /// Check the ordering invariant of both range tables
    ///
    /// Every record must have `start <= end`, and every record must start
    /// strictly after the previous one ends.
    pub fn validate(&self) -> Result<()> {
        let ipv4_file = match self.ipv4.layout() {
            Layout::Legacy => DataFile::Country,
            Layout::Extended => DataFile::City,
        };
        self.ipv4
            .check_ordering()
            .map_err(|source| LoadError::Table {
                file: ipv4_file,
                source,
            })?;

        let ipv6_file = match self.ipv6.layout() {
            Layout::Legacy => DataFile::Country6,
            Layout::Extended => DataFile::City6,
        };
        self.ipv6
            .check_ordering()
            .map_err(|source| LoadError::Table {
                file: ipv6_file,
                source,
            })
    }

    /// Publish order of this snapshot; 0 for the unloaded placeholder
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Where this snapshot came from
    pub fn state(&self) -> SnapshotState {
        self.state
    }

    /// Whether both range tables are empty
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    /// The IPv4 table
    pub fn ipv4(&self) -> &Ipv4Ranges {
        &self.ipv4
    }

    /// The IPv6 table
    pub fn ipv6(&self) -> &Ipv6Ranges {
        &self.ipv6
    }

    /// Number of location records
    pub fn location_count(&self) -> usize {
        self.locations.len()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("ipv4_layout", &self.ipv4.layout())
            .field("ipv4_records", &self.ipv4.len())
            .field("ipv6_layout", &self.ipv6.layout())
            .field("ipv6_records", &self.ipv6.len())
            .field("locations", &self.locations.len())
            .finish()
    }
}

/// An extended-layout input file, as seen by the fallback logic
enum Extended {
    Present(TableBytes),
    Absent,
}

fn read_extended(options: &GeoIpOptions, file: DataFile) -> Result<Extended> {
    let path = options.data_file(file);
    match TableBytes::load(&path, options.load_mode) {
        Ok(Some(bytes)) if !bytes.is_empty() => Ok(Extended::Present(bytes)),
        Ok(_) => {
            debug!(path = %path.display(), "extended data file missing or empty");
            Ok(Extended::Absent)
        }
        Err(e) => Err(LoadError::io(path, e)),
    }
}

fn read_legacy(options: &GeoIpOptions, file: DataFile) -> LoadOutcome {
    let path = options.data_file(file);
    match TableBytes::load(&path, options.load_mode) {
        Ok(Some(bytes)) => LoadOutcome::Legacy(bytes),
        Ok(None) => LoadOutcome::Fatal(LoadError::io(
            path,
            std::io::Error::from(std::io::ErrorKind::NotFound),
        )),
        Err(e) => LoadOutcome::Fatal(LoadError::io(path, e)),
    }
}

impl SnapshotSources {
    /// Resolve all tables from the configured data directory
    ///
    /// Never fails by itself; fatal read errors are carried in
    /// [`LoadOutcome::Fatal`] and surface from [`Snapshot::build`].
    pub fn from_options(options: &GeoIpOptions) -> Self {
        let (ipv4, locations) = resolve_ipv4(options);
        let ipv6 = resolve_ipv6(options);
        SnapshotSources {
            ipv4,
            ipv6,
            locations,
        }
    }

    /// Sources backed by in-memory buffers
    pub fn from_bytes(ipv4: LoadOutcome, ipv6: LoadOutcome, locations: Option<Vec<u8>>) -> Self {
        SnapshotSources {
            ipv4,
            ipv6,
            locations: locations.map(TableBytes::from),
        }
    }
}

fn resolve_ipv4(options: &GeoIpOptions) -> (LoadOutcome, Option<TableBytes>) {
    let names = match read_extended(options, DataFile::CityNames) {
        Ok(names) => names,
        Err(e) => return (LoadOutcome::Fatal(e), None),
    };

    let Extended::Present(names) = names else {
        debug!("falling back to legacy IPv4 layout");
        return (read_legacy(options, DataFile::Country), None);
    };

    match read_extended(options, DataFile::City) {
        Ok(Extended::Present(city)) => (LoadOutcome::Extended(city), Some(names)),
        Ok(Extended::Absent) => {
            debug!("falling back to legacy IPv4 layout");
            // IPv6 extended records may still reference the location table
            (read_legacy(options, DataFile::Country), Some(names))
        }
        Err(e) => (LoadOutcome::Fatal(e), None),
    }
}

fn resolve_ipv6(options: &GeoIpOptions) -> LoadOutcome {
    match read_extended(options, DataFile::City6) {
        Ok(Extended::Present(city6)) => LoadOutcome::Extended(city6),
        Ok(Extended::Absent) => {
            debug!("falling back to legacy IPv6 layout");
            read_legacy(options, DataFile::Country6)
        }
        Err(e) => LoadOutcome::Fatal(e),
    }
}
