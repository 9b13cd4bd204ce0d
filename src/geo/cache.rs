use std::collections::HashMap;

use log::debug;

use crate::models::GeoPoint;

/// Bounded cache of IP -> resolved geo point. Mirrors `store::lpm`'s eviction
/// contract: once the entry count crosses `high_water_mark`, an arbitrary
/// fraction of entries is dropped. No ordering (LRU/LFU) is guaranteed.
pub struct GeoCache {
    entries: HashMap<u32, Option<GeoPoint>>,
    high_water_mark: usize,
    evict_fraction: f32,
}

impl GeoCache {
    pub fn new(capacity: usize, evict_fraction: f32) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            high_water_mark: capacity,
            evict_fraction,
        }
    }

    pub fn get(&self, ip: u32) -> Option<Option<GeoPoint>> {
        self.entries.get(&ip).cloned()
    }

    pub fn insert(&mut self, ip: u32, result: Option<GeoPoint>) {
        self.entries.insert(ip, result);
        if self.entries.len() > self.high_water_mark {
            self.evict_some();
        }
    }

    fn evict_some(&mut self) {
        let target = ((self.entries.len() as f32) * self.evict_fraction) as usize;
        let victims: Vec<u32> = self.entries.keys().take(target.max(1)).copied().collect();
        for key in &victims {
            self.entries.remove(key);
        }
        debug!(
            "GeoCache evicted {} entries ({} remain)",
            victims.len(),
            self.entries.len()
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64) -> GeoPoint {
        GeoPoint {
            lat,
            lng: 0.0,
            country: "US".into(),
        }
    }

    #[test]
    fn test_insert_then_get_hits() {
        let mut cache = GeoCache::new(10, 0.2);
        cache.insert(1, Some(point(1.0)));
        assert_eq!(cache.get(1), Some(Some(point(1.0))));
    }

    #[test]
    fn test_miss_returns_none_distinct_from_cached_absence() {
        let mut cache = GeoCache::new(10, 0.2);
        cache.insert(2, None);
        assert_eq!(cache.get(2), Some(None));
        assert_eq!(cache.get(3), None);
    }

    #[test]
    fn test_crossing_high_water_mark_evicts() {
        let mut cache = GeoCache::new(4, 0.5);
        for i in 0..10u32 {
            cache.insert(i, Some(point(i as f64)));
        }
        assert!(cache.len() < 10);
    }
}
