use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use log::warn;

use super::{CloudRangeEntry, GeoDataLoader, OfflineGeoDb, RirAllocation};
use crate::config::GeoConfig;

/// Default `GeoDataLoader`: cloud ranges and RIR allocations are read as
/// serde_json sidecar files (themselves produced upstream by whatever fetches
/// and normalizes the vendor/RIR data — not this crate's concern, §6); the
/// offline database is handed to `maxminddb` as-is, since its binary layout
/// is a format the crate reads, not parses by hand.
pub struct JsonFileLoader {
    cloud_ranges_path: Option<PathBuf>,
    rir_stats_path: Option<PathBuf>,
    offline_geoip_path: Option<PathBuf>,
}

impl JsonFileLoader {
    pub fn new(config: &GeoConfig) -> Self {
        Self {
            cloud_ranges_path: config.cloud_ranges_path.clone(),
            rir_stats_path: config.rir_stats_path.clone(),
            offline_geoip_path: config.offline_geoip_path.clone(),
        }
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Option<T> {
        let file = File::open(path)
            .map_err(|err| warn!("failed to open {}: {}", path.display(), err))
            .ok()?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|err| warn!("failed to parse {}: {}", path.display(), err))
            .ok()
    }
}

impl GeoDataLoader for JsonFileLoader {
    fn load_cloud_ranges(&self) -> Vec<CloudRangeEntry> {
        self.cloud_ranges_path
            .as_ref()
            .and_then(Self::read_json)
            .unwrap_or_default()
    }

    fn load_rir_allocations(&self) -> Vec<RirAllocation> {
        self.rir_stats_path
            .as_ref()
            .and_then(Self::read_json)
            .unwrap_or_default()
    }

    fn load_offline_db(&self) -> Option<OfflineGeoDb> {
        let path = self.offline_geoip_path.as_ref()?;
        OfflineGeoDb::open(path)
            .map_err(|err| warn!("failed to open offline GeoIP db {}: {}", path.display(), err))
            .ok()
    }
}
