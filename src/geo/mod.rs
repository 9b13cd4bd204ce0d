mod cache;
mod cloud;
mod hubs;
mod loader;
mod mollweide;
mod offline;
mod rir;

use std::sync::Mutex;

use log::warn;

pub use cache::GeoCache;
pub use cloud::{region_to_city, CloudRangeEntry, CloudTrie};
pub use loader::JsonFileLoader;
pub use mollweide::project;
pub use offline::OfflineGeoDb;
pub use rir::{flatten as flatten_rir, RirAllocation, RirSegment};

use crate::models::GeoPoint;

fn is_zero(lat: f64, lng: f64) -> bool {
    lat == 0.0 && lng == 0.0
}

/// Layered IPv4 -> (lat, lng, country) resolver (§4.2). Resolution order:
/// cloud-provider overrides, offline GeoIP, RIR delegations, country hubs.
/// A zero-coordinate intermediate result is treated as "no coordinate yet"
/// and falls through to the next layer rather than being returned.
pub struct GeoResolver {
    cloud: CloudTrie,
    rir_segments: Vec<RirSegment>,
    offline: Option<OfflineGeoDb>,
    cache: Mutex<GeoCache>,
}

impl GeoResolver {
    pub fn new(
        cloud_entries: Vec<CloudRangeEntry>,
        rir_allocations: Vec<RirAllocation>,
        offline: Option<OfflineGeoDb>,
        cache_size: usize,
        evict_fraction: f32,
    ) -> Self {
        Self {
            cloud: CloudTrie::build(&cloud_entries),
            rir_segments: rir::flatten(&rir_allocations),
            offline,
            cache: Mutex::new(GeoCache::new(cache_size, evict_fraction)),
        }
    }

    pub fn resolve(&self, ip: u32) -> Option<GeoPoint> {
        if let Some(cached) = self.cache.lock().unwrap().get(ip) {
            return cached;
        }
        let result = self.resolve_uncached(ip);
        self.cache.lock().unwrap().insert(ip, result.clone());
        result
    }

    fn resolve_uncached(&self, ip: u32) -> Option<GeoPoint> {
        if let Some(point) = self.resolve_via_cloud(ip) {
            return Some(point);
        }
        if let Some(point) = self.resolve_via_offline(ip) {
            return Some(point);
        }
        self.resolve_via_rir_and_hub(ip)
    }

    fn resolve_via_cloud(&self, ip: u32) -> Option<GeoPoint> {
        let region = self.cloud.region_for(ip)?;
        let (city, cc) = region_to_city(region)?;
        let (lat, lng) = hubs::coords_for(cc, city)?;
        if is_zero(lat, lng) {
            return None;
        }
        Some(GeoPoint {
            lat,
            lng,
            country: cc.to_string(),
        })
    }

    fn resolve_via_offline(&self, ip: u32) -> Option<GeoPoint> {
        let db = self.offline.as_ref()?;
        let (lat, lng, cc, city) = db.lookup(ip)?;
        if !is_zero(lat, lng) {
            return Some(GeoPoint { lat, lng, country: cc });
        }
        if city.is_empty() {
            return None;
        }
        let (lat, lng) = hubs::coords_for(&cc, &city)?;
        if is_zero(lat, lng) {
            return None;
        }
        Some(GeoPoint { lat, lng, country: cc })
    }

    fn resolve_via_rir_and_hub(&self, ip: u32) -> Option<GeoPoint> {
        let cc = rir::lookup(&self.rir_segments, ip)?;
        let mut rng = rand::thread_rng();
        let (_, lat, lng) = hubs::sample(cc, &mut rng)?;
        Some(GeoPoint {
            lat,
            lng,
            country: cc.to_string(),
        })
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

/// Loads the external, pre-fetched reference data a `GeoResolver` needs at
/// startup. Parsing raw AWS/GCP range feeds, RIR delegated-stats files, and
/// GeoLite2 databases into these shapes is an external collaborator's job;
/// the core only consumes the result (§6).
pub trait GeoDataLoader {
    fn load_cloud_ranges(&self) -> Vec<CloudRangeEntry>;
    fn load_rir_allocations(&self) -> Vec<RirAllocation>;
    fn load_offline_db(&self) -> Option<OfflineGeoDb>;
}

/// Builds a `GeoResolver` from a loader, logging (not failing) when an
/// optional layer's data is unavailable.
pub fn build_resolver(
    loader: &dyn GeoDataLoader,
    cache_size: usize,
    evict_fraction: f32,
) -> GeoResolver {
    let cloud_entries = loader.load_cloud_ranges();
    let rir_allocations = loader.load_rir_allocations();
    if cloud_entries.is_empty() {
        warn!("GeoResolver starting with no cloud-provider ranges loaded");
    }
    if rir_allocations.is_empty() {
        warn!("GeoResolver starting with no RIR delegation data loaded");
    }
    GeoResolver::new(
        cloud_entries,
        rir_allocations,
        loader.load_offline_db(),
        cache_size,
        evict_fraction,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
        u32::from(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_cloud_layer_resolves_known_region() {
        let cloud = vec![CloudRangeEntry {
            cidr: crate::utils::Ipv4Cidr::new(ip(3, 0, 0, 0), 8),
            region: "us-east-1".into(),
            service: "EC2".into(),
        }];
        let resolver = GeoResolver::new(cloud, vec![], None, 1000, 0.2);
        let point = resolver.resolve(ip(3, 1, 1, 1)).unwrap();
        assert_eq!(point.country, "US");
    }

    #[test]
    fn test_rir_layer_falls_through_to_hub() {
        let rir_allocs = vec![RirAllocation {
            start: ip(81, 0, 0, 0),
            count: 65536,
            country: "GB".into(),
        }];
        let resolver = GeoResolver::new(vec![], rir_allocs, None, 1000, 0.2);
        let point = resolver.resolve(ip(81, 0, 1, 1)).unwrap();
        assert_eq!(point.country, "GB");
        assert!((point.lat - 51.5074).abs() < 0.001);
    }

    #[test]
    fn test_unresolvable_ip_returns_none() {
        let resolver = GeoResolver::new(vec![], vec![], None, 1000, 0.2);
        assert_eq!(resolver.resolve(ip(203, 0, 113, 1)), None);
    }

    #[test]
    fn test_resolution_is_cached() {
        let cloud = vec![CloudRangeEntry {
            cidr: crate::utils::Ipv4Cidr::new(ip(3, 0, 0, 0), 8),
            region: "us-east-1".into(),
            service: "EC2".into(),
        }];
        let resolver = GeoResolver::new(cloud, vec![], None, 1000, 0.2);
        resolver.resolve(ip(3, 1, 1, 1));
        assert_eq!(resolver.cache_len(), 1);
    }
}
