//! Configuration for opening a [`crate::GeoIp`] handle

use crate::format::DataFile;
use crate::table::LoadMode;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "GEODATADIR";

/// Data directory used when [`DATA_DIR_ENV`] is unset
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default quiet period before a burst of file events triggers a reload
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_secs(60);

/// Options for loading data files
///
/// # Examples
///
/// ```
/// use geodat::{GeoIpOptions, LoadMode};
/// use std::time::Duration;
///
/// let options = GeoIpOptions::with_data_dir("/var/lib/geoip")
///     .load_mode(LoadMode::Mmap)
///     .watch_debounce(Duration::from_secs(5))
///     .strict(true);
/// assert!(options.data_file(geodat::DataFile::City).ends_with("geoip-city.dat"));
/// ```
#[derive(Debug, Clone)]
pub struct GeoIpOptions {
    /// Directory holding the five data files
    pub data_dir: PathBuf,

    /// How file contents are brought into memory
    pub load_mode: LoadMode,

    /// Quiet period the watcher waits for before reloading
    pub watch_debounce: Duration,

    /// Check range ordering while building each snapshot
    pub strict: bool,
}

impl Default for GeoIpOptions {
    /// Reads the data directory from `GEODATADIR`, falling back to `./data`
    fn default() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Self::with_data_dir(data_dir)
    }
}

impl GeoIpOptions {
    /// Options for an explicit data directory, ignoring the environment
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            load_mode: LoadMode::default(),
            watch_debounce: DEFAULT_WATCH_DEBOUNCE,
            strict: false,
        }
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set how files are loaded
    pub fn load_mode(mut self, mode: LoadMode) -> Self {
        self.load_mode = mode;
        self
    }

    /// Set the watcher's quiet period
    pub fn watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    /// Enable or disable ordering checks during reload
    ///
    /// A table that fails the check aborts the reload, leaving the previous
    /// snapshot in place.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Full path of one data file
    pub fn data_file(&self, file: DataFile) -> PathBuf {
        self.data_dir.join(file.file_name())
    }

    /// The configured data directory
    pub fn dir(&self) -> &Path {
        &self.data_dir
    }
}
