//! The shared lookup handle
//!
//! [`GeoIp`] owns the published-snapshot pointer. Lookups load the
//! current [`Snapshot`] without locking and run against it to completion;
//! reloads build a complete replacement off to the side and swap it in
//! with one atomic store. A failed reload publishes nothing.
//!
//! # Example
//!
//! ```no_run
//! use geodat::GeoIp;
//!
//! let geo = GeoIp::from_dir("/var/lib/geoip")?;
//! if let Some(record) = geo.lookup("72.229.28.185") {
//!     println!("{} {} {}", record.country, record.region, record.city);
//! }
//!
//! // Pick up new files without blocking lookups
//! geo.reload_data(|result| {
//!     if let Err(e) = result {
//!         eprintln!("reload failed: {e}");
//!     }
//! });
//! # Ok::<(), geodat::LoadError>(())
//! ```

use crate::address::{normalize, AddressInput, NormalizedAddress};
use crate::error::Result;
use crate::lookup::GeoRecord;
use crate::options::GeoIpOptions;
use crate::snapshot::Snapshot;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

#[cfg(feature = "watch")]
use crate::watcher::DataWatcher;

struct Shared {
    options: GeoIpOptions,
    current: ArcSwap<Snapshot>,
    /// Generation handed to the next published snapshot
    next_generation: AtomicU64,
    /// Serializes every publish
    reload_lock: Mutex<()>,
    #[cfg(feature = "watch")]
    watcher: Mutex<Option<DataWatcher>>,
}

impl Shared {
    fn reload(&self) -> Result<()> {
        let _guard = self.reload_lock.lock();
        let generation = self.next_generation.load(Ordering::Acquire);

        match Snapshot::load(&self.options, generation) {
            Ok(snapshot) => {
                info!(
                    generation,
                    ipv4_layout = ?snapshot.ipv4().layout(),
                    ipv4_records = snapshot.ipv4().len(),
                    ipv6_layout = ?snapshot.ipv6().layout(),
                    ipv6_records = snapshot.ipv6().len(),
                    locations = snapshot.location_count(),
                    "published geo snapshot"
                );
                self.current.store(Arc::new(snapshot));
                self.next_generation.store(generation + 1, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                warn!(
                    error = %e,
                    active_generation = self.current.load().generation(),
                    "reload failed, keeping current snapshot"
                );
                Err(e)
            }
        }
    }

    fn clear(&self) {
        let _guard = self.reload_lock.lock();
        let generation = self.next_generation.load(Ordering::Acquire);
        self.current.store(Arc::new(Snapshot::cleared(generation)));
        self.next_generation.store(generation + 1, Ordering::Release);
        info!(generation, "cleared geo data");
    }
}

/// Thread-safe IP geolocation handle
///
/// Cloning is cheap; clones share the same published snapshot, reload
/// lock and watcher.
#[derive(Clone)]
pub struct GeoIp {
    shared: Arc<Shared>,
}

impl GeoIp {
    /// Create a handle with nothing loaded
    ///
    /// Every lookup returns `None` until the first successful reload.
    pub fn new(options: GeoIpOptions) -> Self {
        GeoIp {
            shared: Arc::new(Shared {
                options,
                current: ArcSwap::from_pointee(Snapshot::unloaded()),
                next_generation: AtomicU64::new(1),
                reload_lock: Mutex::new(()),
                #[cfg(feature = "watch")]
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Create a handle and load the data files
    pub fn open(options: GeoIpOptions) -> Result<Self> {
        let geo = Self::new(options);
        geo.reload_data_sync()?;
        Ok(geo)
    }

    /// Load the data files from `dir` with default options
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open(GeoIpOptions::with_data_dir(dir))
    }

    /// The options this handle was created with
    pub fn options(&self) -> &GeoIpOptions {
        &self.shared.options
    }

    /// Look up an address given as text or as a numeric IPv4 value
    ///
    /// ```no_run
    /// # let geo = geodat::GeoIp::from_dir("data")?;
    /// let by_text = geo.lookup("1.1.1.1");
    /// let by_value = geo.lookup(16843009u32);
    /// assert_eq!(by_text, by_value);
    /// # Ok::<(), geodat::LoadError>(())
    /// ```
    pub fn lookup<'a>(&self, address: impl Into<AddressInput<'a>>) -> Option<GeoRecord> {
        self.lookup_normalized(normalize(address.into()))
    }

    /// Look up a parsed address
    ///
    /// IPv4-mapped IPv6 addresses are looked up in the IPv4 table.
    pub fn lookup_ip(&self, address: IpAddr) -> Option<GeoRecord> {
        self.lookup_normalized(NormalizedAddress::from(address))
    }

    fn lookup_normalized(&self, address: NormalizedAddress) -> Option<GeoRecord> {
        if address == NormalizedAddress::Invalid {
            return None;
        }
        self.shared.current.load().lookup(address)
    }

    /// The currently published snapshot
    ///
    /// Holding it keeps several lookups consistent with each other across
    /// a concurrent reload.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.current.load_full()
    }

    /// Generation of the currently published snapshot
    pub fn generation(&self) -> u64 {
        self.shared.current.load().generation()
    }

    /// Reload all data files, blocking until published or failed
    ///
    /// On error the previous snapshot stays active.
    pub fn reload_data_sync(&self) -> Result<()> {
        self.shared.reload()
    }

    /// Reload all data files on a background thread
    ///
    /// `callback` runs on that thread with the outcome. Concurrent reloads
    /// queue behind each other.
    pub fn reload_data<F>(&self, callback: F) -> thread::JoinHandle<()>
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || callback(shared.reload()))
    }

    /// Publish an empty snapshot
    ///
    /// Every lookup returns `None` until the next successful reload.
    pub fn clear(&self) {
        self.shared.clear();
    }

    /// Reload in the background whenever the data files change
    ///
    /// Changes are debounced by [`GeoIpOptions::watch_debounce`]. Each
    /// reload's outcome is passed to `callback`. Calling this again
    /// replaces the previous watcher.
    #[cfg(feature = "watch")]
    pub fn start_watching_data_update<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(Result<()>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let weak = Arc::downgrade(&self.shared);
        let options = &self.shared.options;

        let watcher = DataWatcher::spawn(options.dir(), options.watch_debounce, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let callback = Arc::clone(&callback);
            GeoIp { shared }.reload_data(move |result| callback(result));
        })?;

        let previous = self.shared.watcher.lock().replace(watcher);
        drop(previous);
        Ok(())
    }

    /// Stop the watcher started by [`GeoIp::start_watching_data_update`]
    #[cfg(feature = "watch")]
    pub fn stop_watching_data_update(&self) {
        let previous = self.shared.watcher.lock().take();
        drop(previous);
    }

    /// Whether a watcher is running
    #[cfg(feature = "watch")]
    pub fn is_watching(&self) -> bool {
        self.shared.watcher.lock().is_some()
    }
}

impl std::fmt::Debug for GeoIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoIp")
            .field("data_dir", &self.shared.options.data_dir)
            .field("snapshot", &*self.shared.current.load())
            .finish()
    }
}
