use std::collections::HashMap;
use std::sync::Mutex;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};

use crate::error::PipelineError;
use crate::utils::Ipv4Cidr;

/// Encode (network, mask) into the 5-byte big-endian key format: 4 bytes of IP
/// followed by 1 byte of mask length.
pub fn encode_key(cidr: Ipv4Cidr) -> [u8; 5] {
    let mut key = [0u8; 5];
    BigEndian::write_u32(&mut key[0..4], cidr.network);
    key[4] = cidr.mask;
    key
}

/// Inverse of `encode_key`. Returns `None` if `raw` isn't 5 bytes.
pub fn decode_key(raw: &[u8]) -> Option<Ipv4Cidr> {
    if raw.len() != 5 {
        return None;
    }
    let network = BigEndian::read_u32(&raw[0..4]);
    Some(Ipv4Cidr::new(network, raw[4]))
}

type CacheEntry = Option<(Vec<u8>, u8)>;

/// Bounded memoization for `lookup`, keyed by the plain 32-bit IP (not the
/// 5-byte LPM key, since the mask length is exactly what's being resolved).
struct LookupCache {
    entries: HashMap<u32, CacheEntry>,
    high_water_mark: usize,
    evict_fraction: f32,
}

impl LookupCache {
    fn new(high_water_mark: usize, evict_fraction: f32) -> Self {
        Self {
            entries: HashMap::new(),
            high_water_mark,
            evict_fraction,
        }
    }

    fn get(&self, ip: u32) -> Option<CacheEntry> {
        self.entries.get(&ip).cloned()
    }

    fn insert(&mut self, ip: u32, value: CacheEntry) {
        if self.entries.len() >= self.high_water_mark {
            self.evict_some();
        }
        self.entries.insert(ip, value);
    }

    // No ordering guarantee beyond "eventually shrinks" (spec 4.1): drop an
    // arbitrary fraction of entries rather than maintain LRU bookkeeping.
    fn evict_some(&mut self) {
        let target = ((self.entries.len() as f32) * self.evict_fraction) as usize;
        let victims: Vec<u32> = self.entries.keys().take(target.max(1)).copied().collect();
        for key in victims {
            self.entries.remove(&key);
        }
        debug!("LPM lookup cache evicted to {} entries", self.entries.len());
    }

    fn invalidate(&mut self, ip: u32) {
        self.entries.remove(&ip);
    }
}

/// Durable, IPv4 longest-prefix-match key-value store, backed by an embedded
/// on-disk database. Multi-reader/serialized-writer; concurrency-safe by
/// construction (the underlying medium serializes writes internally).
pub struct LongestPrefixStore {
    db: Option<sled::Db>,
    cache: Mutex<LookupCache>,
}

impl LongestPrefixStore {
    pub fn open(path: &std::path::Path, cache_size: usize, evict_fraction: f32) -> Result<Self, PipelineError> {
        let db = sled::open(path)?;
        Ok(Self {
            db: Some(db),
            cache: Mutex::new(LookupCache::new(cache_size, evict_fraction)),
        })
    }

    fn db(&self) -> Result<&sled::Db, PipelineError> {
        self.db.as_ref().ok_or(PipelineError::Closed)
    }

    pub fn insert(&self, cidr: Ipv4Cidr, value: &[u8]) -> Result<(), PipelineError> {
        let db = self.db()?;
        db.insert(encode_key(cidr), value)?;
        self.cache.lock().unwrap().invalidate(cidr.network);
        Ok(())
    }

    /// Write-batched upsert, atomic at batch granularity. IO failures are
    /// returned to the caller, who logs and continues (§4.1/§4.3).
    pub fn batch_insert(&self, entries: &[(Ipv4Cidr, Vec<u8>)]) -> Result<(), PipelineError> {
        let db = self.db()?;
        let mut batch = sled::Batch::default();
        for (cidr, value) in entries {
            batch.insert(&encode_key(*cidr)[..], value.as_slice());
        }
        db.apply_batch(batch)?;
        let mut cache = self.cache.lock().unwrap();
        for (cidr, _) in entries {
            cache.invalidate(cidr.network);
        }
        Ok(())
    }

    pub fn get(&self, raw_key: &[u8]) -> Result<Option<Vec<u8>>, PipelineError> {
        let db = self.db()?;
        Ok(db.get(raw_key)?.map(|ivec| ivec.to_vec()))
    }

    /// Longest-prefix-match lookup: probes masks 32 down to 0 and returns the
    /// most specific present entry.
    pub fn lookup(&self, ip: u32) -> Result<Option<(Vec<u8>, u8)>, PipelineError> {
        if let Some(cached) = self.cache.lock().unwrap().get(ip) {
            return Ok(cached);
        }
        let db = self.db()?;
        let mut found = None;
        for mask in (0..=32u8).rev() {
            let shift = 32 - mask;
            let network = if shift >= 32 { 0 } else { (ip >> shift) << shift };
            let key = encode_key(Ipv4Cidr::new(network, mask));
            if let Some(value) = db.get(key)? {
                found = Some((value.to_vec(), mask));
                break;
            }
        }
        self.cache.lock().unwrap().insert(ip, found.clone());
        Ok(found)
    }

    /// Stable iteration over every stored entry, used e.g. for historical overlays.
    pub fn for_each<F>(&self, mut f: F) -> Result<(), PipelineError>
    where
        F: FnMut(Ipv4Cidr, Vec<u8>),
    {
        let db = self.db()?;
        for item in db.iter() {
            let (key, value) = item?;
            if let Some(cidr) = decode_key(&key) {
                f(cidr, value.to_vec());
            }
        }
        Ok(())
    }

    /// Releases the underlying medium; further calls fail with `Closed`.
    pub fn close(&mut self) {
        if let Some(db) = self.db.take() {
            if let Err(err) = db.flush() {
                warn!("Error flushing store on close: {}", err);
            }
        }
    }
}

impl Drop for LongestPrefixStore {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> LongestPrefixStore {
        let dir = tempdir();
        LongestPrefixStore::open(&dir, 1000, 0.2).unwrap()
    }

    fn tempdir() -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("bgp-pulse-lpm-test-{}", rand::random::<u64>()));
        path
    }

    #[test]
    fn test_key_encode_decode_round_trip() {
        let cidr = Ipv4Cidr::new(0x0A_00_00_00, 8);
        let key = encode_key(cidr);
        assert_eq!(key.len(), 5);
        assert_eq!(decode_key(&key), Some(cidr));
    }

    #[test]
    fn test_insert_then_lookup_returns_longest_match() {
        let store = open_temp();
        let broad = Ipv4Cidr::new(u32::from(std::net::Ipv4Addr::new(10, 0, 0, 0)), 8);
        let narrow = Ipv4Cidr::new(u32::from(std::net::Ipv4Addr::new(10, 1, 2, 0)), 24);
        store.insert(broad, b"broad").unwrap();
        store.insert(narrow, b"narrow").unwrap();

        let ip = u32::from(std::net::Ipv4Addr::new(10, 1, 2, 5));
        let (value, mask) = store.lookup(ip).unwrap().unwrap();
        assert_eq!(value, b"narrow");
        assert_eq!(mask, 24);

        let other_ip = u32::from(std::net::Ipv4Addr::new(10, 9, 9, 9));
        let (value, mask) = store.lookup(other_ip).unwrap().unwrap();
        assert_eq!(value, b"broad");
        assert_eq!(mask, 8);
    }

    #[test]
    fn test_lookup_absent_returns_none() {
        let store = open_temp();
        let ip = u32::from(std::net::Ipv4Addr::new(8, 8, 8, 8));
        assert!(store.lookup(ip).unwrap().is_none());
    }

    #[test]
    fn test_closed_store_rejects_calls() {
        let mut store = open_temp();
        store.close();
        let cidr = Ipv4Cidr::new(0, 8);
        assert!(matches!(store.insert(cidr, b"x"), Err(PipelineError::Closed)));
    }

    #[test]
    fn test_batch_insert_then_get_exact_key() {
        let store = open_temp();
        let cidr = Ipv4Cidr::new(u32::from(std::net::Ipv4Addr::new(1, 1, 1, 0)), 24);
        store.batch_insert(&[(cidr, b"v".to_vec())]).unwrap();
        let raw = store.get(&encode_key(cidr)).unwrap();
        assert_eq!(raw, Some(b"v".to_vec()));
    }
}
