use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::SecondaryKind;

/// How many of a peer's most recent path lengths we keep, just enough to
/// detect a 3-observation strictly-increasing run (§4.5 path_hunting).
const PATH_LENGTH_HISTORY: usize = 4;

/// A peer's most recently observed attributes for a prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerObservation {
    pub as_path: Vec<u32>,
    pub communities: Vec<(u32, u32)>,
    pub next_hop: String,
    pub aggregator: Option<String>,
}

/// Accumulated diff counters for one peer, used to detect churn patterns.
#[derive(Debug, Clone, Default)]
pub struct PerPeerChurn {
    pub msg_count: u32,
    pub path_changes: u32,
    pub community_changes: u32,
    pub next_hop_changes: u32,
    pub aggregator_changes: u32,
    pub path_length_increases: u32,
    pub path_length_decreases: u32,
    pub recent_path_lengths: VecDeque<usize>,
}

impl PerPeerChurn {
    /// True if the last 3 recorded path lengths strictly increased.
    pub fn has_monotonic_increase_run(&self) -> bool {
        if self.recent_path_lengths.len() < 3 {
            return false;
        }
        let mut last_three = self.recent_path_lengths.iter().rev().take(3);
        let c = *last_three.next().unwrap();
        let b = *last_three.next().unwrap();
        let a = *last_three.next().unwrap();
        a < b && b < c
    }
}

/// Per-prefix rolling state the classifier updates on every observed message
/// and reads back to decide a secondary label. Owned exclusively by the
/// classifier; never shared.
#[derive(Debug, Clone)]
pub struct PrefixClassifierState {
    pub first_seen: i64,
    pub last_seen: i64,
    pub total_msgs: u32,
    pub total_announcements: u32,
    pub total_withdrawals: u32,
    pub peers: HashMap<String, PeerObservation>,
    pub churn: HashMap<String, PerPeerChurn>,
    pub unique_next_hops: HashSet<String>,
    pub unique_aggregators: HashSet<String>,
    pub last_origin_asn: Option<u32>,
    pub sticky_label: Option<SecondaryKind>,
    pub sticky_until: Option<i64>,
}

impl PrefixClassifierState {
    pub fn new(now: i64) -> Self {
        Self {
            first_seen: now,
            last_seen: now,
            total_msgs: 0,
            total_announcements: 0,
            total_withdrawals: 0,
            peers: HashMap::new(),
            churn: HashMap::new(),
            unique_next_hops: HashSet::new(),
            unique_aggregators: HashSet::new(),
            last_origin_asn: None,
            sticky_label: None,
            sticky_until: None,
        }
    }

    pub fn record_announcement(
        &mut self,
        peer: &str,
        as_path: Vec<u32>,
        communities: Vec<(u32, u32)>,
        next_hop: String,
        aggregator: Option<String>,
        now: i64,
    ) {
        self.total_msgs += 1;
        self.total_announcements += 1;
        self.last_seen = now;
        self.last_origin_asn = as_path.last().copied();
        self.unique_next_hops.insert(next_hop.clone());
        if let Some(agg) = &aggregator {
            self.unique_aggregators.insert(agg.clone());
        }

        let path_length = as_path.len();
        let churn = self.churn.entry(peer.to_string()).or_default();
        churn.msg_count += 1;

        if let Some(prev) = self.peers.get(peer) {
            if prev.as_path != as_path {
                churn.path_changes += 1;
            }
            if prev.communities != communities {
                churn.community_changes += 1;
            }
            if prev.next_hop != next_hop {
                churn.next_hop_changes += 1;
            }
            if prev.aggregator != aggregator {
                churn.aggregator_changes += 1;
            }
            match path_length.cmp(&prev.as_path.len()) {
                std::cmp::Ordering::Greater => churn.path_length_increases += 1,
                std::cmp::Ordering::Less => churn.path_length_decreases += 1,
                std::cmp::Ordering::Equal => {}
            }
        }
        churn.recent_path_lengths.push_back(path_length);
        if churn.recent_path_lengths.len() > PATH_LENGTH_HISTORY {
            churn.recent_path_lengths.pop_front();
        }

        self.peers.insert(
            peer.to_string(),
            PeerObservation {
                as_path,
                communities,
                next_hop,
                aggregator,
            },
        );
    }

    pub fn record_withdrawal(&mut self, peer: &str, now: i64) {
        self.total_msgs += 1;
        self.total_withdrawals += 1;
        self.last_seen = now;
        self.churn.entry(peer.to_string()).or_default().msg_count += 1;
    }

    pub fn elapsed_ms(&self, now: i64) -> i64 {
        (now - self.first_seen).max(0)
    }

    /// Dropped when idle past `idle_threshold_ms` and below the sticky
    /// retention floor (low total message count ⇒ nothing worth keeping).
    pub fn is_evictable(&self, now: i64, idle_threshold_ms: i64, sticky_retention_msgs: u32) -> bool {
        let idle = now.saturating_sub(self.last_seen) >= idle_threshold_ms;
        idle && self.total_msgs < sticky_retention_msgs
    }
}
