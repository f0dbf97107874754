//! Immutable range and location tables
//!
//! A table owns its bytes (either a heap copy or a read-only memory map)
//! and views them as a slice of fixed-size records. Tables are built once
//! per snapshot and never mutated, so they can be shared across threads
//! without copying.

use crate::error::TableError;
use crate::format::{LocationRecord, RangeRecord};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::Path;
use zerocopy::FromBytes;

/// How data files are brought into memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Copy the file contents onto the heap
    #[default]
    Read,
    /// Map the file read-only
    ///
    /// Data files must then be replaced by rename, never rewritten in
    /// place, or readers of the old snapshot may observe the new bytes.
    Mmap,
}

/// Storage for table data - either owned or memory-mapped
pub enum TableBytes {
    /// Heap copy
    Owned(Vec<u8>),
    /// Read-only memory map
    Mapped(Mmap),
}

impl TableBytes {
    /// Read a whole file
    ///
    /// Returns `Ok(None)` when the file does not exist. Every other
    /// failure is returned as an error.
    pub fn load(path: &Path, mode: LoadMode) -> io::Result<Option<TableBytes>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(io::Error::other("is a directory"));
        }
        let len = metadata.len();
        if len == 0 {
            // Mapping an empty file fails on some platforms
            return Ok(Some(TableBytes::Owned(Vec::new())));
        }

        let bytes = match mode {
            LoadMode::Read => {
                let mut file = file;
                let mut buf = Vec::with_capacity(len as usize);
                file.read_to_end(&mut buf)?;
                TableBytes::Owned(buf)
            }
            LoadMode::Mmap => TableBytes::Mapped(unsafe { Mmap::map(&file)? }),
        };
        Ok(Some(bytes))
    }

    /// View the bytes
    pub fn as_slice(&self) -> &[u8] {
        match self {
            TableBytes::Owned(v) => v.as_slice(),
            TableBytes::Mapped(m) => &m[..],
        }
    }

    /// Whether the storage is memory-mapped
    pub fn is_mapped(&self) -> bool {
        matches!(self, TableBytes::Mapped(_))
    }
}

impl Deref for TableBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Vec<u8>> for TableBytes {
    fn from(bytes: Vec<u8>) -> Self {
        TableBytes::Owned(bytes)
    }
}

impl fmt::Debug for TableBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableBytes")
            .field("len", &self.as_slice().len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

fn check_record_multiple(len: usize, record_size: usize) -> Result<(), TableError> {
    if len % record_size != 0 {
        return Err(TableError::PartialRecord { len, record_size });
    }
    Ok(())
}

/// A sorted table of address ranges
///
/// The first and last addresses are read once at construction and cached;
/// an empty table has no bounds and contains nothing.
pub struct RangeTable<R: RangeRecord> {
    bytes: TableBytes,
    bounds: Option<(R::Addr, R::Addr)>,
    _record: PhantomData<R>,
}

impl<R: RangeRecord> RangeTable<R> {
    /// Wrap table bytes, checking they hold whole records
    pub fn new(bytes: TableBytes) -> Result<Self, TableError> {
        check_record_multiple(bytes.len(), std::mem::size_of::<R>())?;

        let mut table = Self {
            bytes,
            bounds: None,
            _record: PhantomData,
        };
        let records = table.records();
        let bounds = match (records.first(), records.last()) {
            (Some(first), Some(last)) => Some((first.start(), last.end())),
            _ => None,
        };
        table.bounds = bounds;
        Ok(table)
    }

    /// A table with no records
    pub fn empty() -> Self {
        RangeTable {
            bytes: TableBytes::Owned(Vec::new()),
            bounds: None,
            _record: PhantomData,
        }
    }

    /// All records in address order
    #[inline]
    pub fn records(&self) -> &[R] {
        // Length was checked in new(), and records are Unaligned
        <[R]>::ref_from_bytes(self.bytes.as_slice()).unwrap_or(&[])
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.bytes.len() / std::mem::size_of::<R>()
    }

    /// Whether the table has no records
    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// `(first start, last end)`, or `None` when empty
    pub fn bounds(&self) -> Option<(R::Addr, R::Addr)> {
        self.bounds
    }

    /// Whether the table's bytes are memory-mapped
    pub fn is_mapped(&self) -> bool {
        self.bytes.is_mapped()
    }

    /// Whether `addr` lies within `[first, last]`
    #[inline]
    pub fn in_bounds(&self, addr: R::Addr) -> bool {
        match self.bounds {
            Some((first, last)) => addr >= first && addr <= last,
            None => false,
        }
    }

    /// Find the record whose range contains `addr`
    ///
    /// Bisects between a floor index `fline` and a ceiling index `cline`,
    /// probing `line = fline + round((cline - fline) / 2)`. Any matching
    /// index `m` satisfies `fline <= m <= cline` throughout. Each probe
    /// that misses moves one bound onto `line`, and `line` lies strictly
    /// between the bounds whenever they are two or more apart, so the gap
    /// shrinks every iteration. When the bounds are adjacent the probe
    /// lands on `cline`; a miss there collapses the window onto `fline`,
    /// which is probed once more before giving up.
    pub fn find(&self, addr: R::Addr) -> Option<&R> {
        let records = self.records();
        let mut fline = 0usize;
        let mut cline = records.len().checked_sub(1)?;

        loop {
            let line = fline + (cline - fline).div_ceil(2);
            let record = &records[line];
            let start = record.start();
            let end = record.end();

            if start <= addr && addr <= end {
                return Some(record);
            }
            if fline == cline {
                return None;
            }
            if fline + 1 == cline {
                if line == fline {
                    fline = cline;
                } else {
                    cline = fline;
                }
            } else if start > addr {
                cline = line;
            } else {
                fline = line;
            }
        }
    }

    /// Check that every record is well-formed and strictly after its
    /// predecessor
    pub fn check_ordering(&self) -> Result<(), TableError> {
        let records = self.records();
        for (index, record) in records.iter().enumerate() {
            if record.start() > record.end() {
                return Err(TableError::InvertedRange { index });
            }
            if index > 0 && records[index - 1].end() >= record.start() {
                return Err(TableError::Unordered { index });
            }
        }
        Ok(())
    }
}

impl<R: RangeRecord> fmt::Debug for RangeTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeTable")
            .field("layout", &R::RECORD_LAYOUT)
            .field("records", &self.len())
            .field("bounds", &self.bounds)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// Location records addressed by id
pub struct LocationTable {
    bytes: TableBytes,
}

impl LocationTable {
    /// Wrap location bytes, checking they hold whole records
    pub fn new(bytes: TableBytes) -> Result<Self, TableError> {
        check_record_multiple(bytes.len(), std::mem::size_of::<LocationRecord>())?;
        Ok(LocationTable { bytes })
    }

    /// A table with no locations
    pub fn empty() -> Self {
        LocationTable {
            bytes: TableBytes::Owned(Vec::new()),
        }
    }

    /// The record at `id`, if the table is that large
    #[inline]
    pub fn get(&self, id: u32) -> Option<&LocationRecord> {
        <[LocationRecord]>::ref_from_bytes(self.bytes.as_slice())
            .ok()?
            .get(id as usize)
    }

    /// Number of locations
    pub fn len(&self) -> usize {
        self.bytes.len() / std::mem::size_of::<LocationRecord>()
    }

    /// Whether the table has no locations
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for LocationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationTable")
            .field("records", &self.len())
            .field("mapped", &self.bytes.is_mapped())
            .finish()
    }
}
