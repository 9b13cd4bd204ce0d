use std::fmt;

use super::Prefix;

/// What changed about a prefix observation, independent of *why* (see `SecondaryKind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimaryKind {
    New,
    Update,
    Withdrawal,
    Gossip,
}

impl fmt::Display for PrimaryKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            PrimaryKind::New => "new",
            PrimaryKind::Update => "update",
            PrimaryKind::Withdrawal => "withdrawal",
            PrimaryKind::Gossip => "gossip",
        };
        write!(f, "{}", word)
    }
}

/// The anomaly label the classifier currently assigns to a prefix, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryKind {
    None,
    Discovery,
    PolicyChurn,
    PathHunting,
    PathLengthOscillation,
    LinkFlap,
    Babbling,
    AggregatorFlap,
    NextHopOscillation,
    Outage,
    RouteLeak,
}

impl SecondaryKind {
    /// Table-order priority; higher wins ties and determines stickiness (see classifier/rules.rs).
    pub fn priority(self) -> u8 {
        use SecondaryKind::*;
        match self {
            RouteLeak | Outage => 3,
            LinkFlap | Babbling | AggregatorFlap | NextHopOscillation => 2,
            PathHunting | PathLengthOscillation | PolicyChurn => 1,
            Discovery | None => 0,
        }
    }
}

impl fmt::Display for SecondaryKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SecondaryKind::*;
        let word = match self {
            None => "none",
            Discovery => "discovery",
            PolicyChurn => "policy_churn",
            PathHunting => "path_hunting",
            PathLengthOscillation => "path_length_oscillation",
            LinkFlap => "link_flap",
            Babbling => "babbling",
            AggregatorFlap => "aggregator_flap",
            NextHopOscillation => "next_hop_oscillation",
            Outage => "outage",
            RouteLeak => "route_leak",
        };
        write!(f, "{}", word)
    }
}

/// A resolved geolocation: latitude, longitude, ISO-3166 country code.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    pub country: String,
}

/// The fully-labeled, geolocated output of the `EventShaper`/`AnomalyClassifier` pipeline.
#[derive(Debug, Clone)]
pub struct PrefixEvent {
    pub prefix: Prefix,
    pub origin_asn: Option<u32>,
    pub geo: Option<GeoPoint>,
    pub primary_kind: PrimaryKind,
    pub secondary_kind: SecondaryKind,
    pub observed_at_millis: i64,
}
