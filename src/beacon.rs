use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Well-known RIPE RIS beacon prefixes: artificially withdrawn/announced on a
/// fixed schedule purely for measurement, matched exactly (not by LPM).
/// https://ris.ripe.net/docs/beacons/
static BEACON_PREFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "93.175.146.0/24",
        "84.205.67.0/24",
        "84.205.80.0/24",
        "93.175.147.0/24",
        "84.205.65.0/24",
        "195.80.224.0/24",
        "84.205.66.0/24",
        "93.175.149.0/24",
        "84.205.64.0/24",
        "93.175.148.0/24",
    ]
    .into_iter()
    .collect()
});

/// Exact-string lookup; a beacon is identified by its canonical CIDR text, not
/// by an LPM relationship to it.
pub fn is_beacon(canonical_cidr: &str) -> bool {
    BEACON_PREFIXES.contains(canonical_cidr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_beacon_matches() {
        assert!(is_beacon("93.175.146.0/24"));
    }

    #[test]
    fn test_non_beacon_does_not_match() {
        assert!(!is_beacon("1.1.1.0/24"));
    }

    #[test]
    fn test_more_specific_prefix_is_not_a_beacon_match() {
        // Exact-string only: a sub-prefix of a beacon block is not itself a beacon.
        assert!(!is_beacon("93.175.146.0/25"));
    }
}
