use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::Ipv4Cidr;

/// One row of a cloud provider's published IP range list: `(cidr, region, service)`.
/// Parsing AWS JSON / Google's geofeed CSV / Azure's XML / etc. into this shape
/// is an external collaborator's job (§6); the core only consumes the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudRangeEntry {
    pub cidr: Ipv4Cidr,
    pub region: String,
    #[allow(dead_code)]
    pub service: String,
}

/// Per-mask exact-hash map (33 slots, mask 0..=32) of cloud-provider ranges to
/// their published region string.
pub struct CloudTrie {
    slots: Vec<HashMap<u32, String>>,
}

impl CloudTrie {
    pub fn build(entries: &[CloudRangeEntry]) -> Self {
        let mut slots: Vec<HashMap<u32, String>> = (0..=32).map(|_| HashMap::new()).collect();
        for entry in entries {
            slots[entry.cidr.mask as usize].insert(entry.cidr.network, entry.region.clone());
        }
        Self { slots }
    }

    /// Longest match across the 33 per-mask maps.
    pub fn region_for(&self, ip: u32) -> Option<&str> {
        for mask in (0..=32u8).rev() {
            let shift = 32 - mask;
            let network = if shift >= 32 { 0 } else { (ip >> shift) << shift };
            if let Some(region) = self.slots[mask as usize].get(&network) {
                return Some(region);
            }
        }
        None
    }
}

/// A region string (e.g. "us-east-1") resolves to a representative (city, country code).
/// A small, well-known static table; providers not listed fall through to the
/// next resolution layer rather than guessing.
pub fn region_to_city(region: &str) -> Option<(&'static str, &'static str)> {
    match region {
        "us-east-1" | "us-east-2" => Some(("Ashburn", "US")),
        "us-west-1" | "us-west-2" => Some(("The Dalles", "US")),
        "eu-west-1" => Some(("Dublin", "IE")),
        "eu-central-1" => Some(("Frankfurt", "DE")),
        "eu-west-2" => Some(("London", "GB")),
        "ap-southeast-1" => Some(("Singapore", "SG")),
        "ap-southeast-2" => Some(("Sydney", "AU")),
        "ap-northeast-1" => Some(("Tokyo", "JP")),
        "sa-east-1" => Some(("Sao Paulo", "BR")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn cidr(a: u8, b: u8, c: u8, d: u8, mask: u8) -> Ipv4Cidr {
        Ipv4Cidr::new(u32::from(Ipv4Addr::new(a, b, c, d)), mask)
    }

    #[test]
    fn test_longest_match_wins() {
        let trie = CloudTrie::build(&[
            CloudRangeEntry {
                cidr: cidr(3, 0, 0, 0, 8),
                region: "us-east-1".into(),
                service: "EC2".into(),
            },
            CloudRangeEntry {
                cidr: cidr(3, 5, 0, 0, 16),
                region: "eu-west-1".into(),
                service: "EC2".into(),
            },
        ]);
        let ip = u32::from(Ipv4Addr::new(3, 5, 1, 1));
        assert_eq!(trie.region_for(ip), Some("eu-west-1"));
        let other = u32::from(Ipv4Addr::new(3, 9, 1, 1));
        assert_eq!(trie.region_for(other), Some("us-east-1"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let trie = CloudTrie::build(&[]);
        assert_eq!(trie.region_for(12345), None);
    }

    #[test]
    fn test_region_to_city_known_and_unknown() {
        assert_eq!(region_to_city("us-east-1"), Some(("Ashburn", "US")));
        assert_eq!(region_to_city("mars-central-1"), None);
    }
}
