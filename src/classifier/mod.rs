mod rules;
mod state;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub use state::PrefixClassifierState;

use crate::capability::SecondaryClassifier;
use crate::models::SecondaryKind;
use crate::utils::Ipv4Cidr;

/// Below this many total messages, a prefix's state isn't worth keeping once
/// idle, even if it's technically within the eviction time window.
const STICKY_RETENTION_MSGS: u32 = 5;

/// Per-prefix rolling classifier (§4.5). Owns one `PrefixClassifierState` per
/// prefix behind a single lock; callers feed it per-message, per-peer
/// attribute observations and get back the current secondary label.
pub struct AnomalyClassifier {
    states: Mutex<HashMap<Ipv4Cidr, PrefixClassifierState>>,
    idle_eviction_ms: i64,
}

impl AnomalyClassifier {
    pub fn new(idle_eviction: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            idle_eviction_ms: idle_eviction.as_millis() as i64,
        }
    }

    pub fn classify_announcement(
        &self,
        prefix: Ipv4Cidr,
        peer: &str,
        as_path: &[u32],
        communities: &[(u32, u32)],
        next_hop: &str,
        aggregator: Option<&str>,
        now_millis: i64,
    ) -> SecondaryKind {
        let mut states = self.states.lock().unwrap();
        let state = states
            .entry(prefix)
            .or_insert_with(|| PrefixClassifierState::new(now_millis));
        state.record_announcement(
            peer,
            as_path.to_vec(),
            communities.to_vec(),
            next_hop.to_string(),
            aggregator.map(str::to_string),
            now_millis,
        );
        rules::evaluate(state, now_millis)
    }

    pub fn classify_withdrawal(
        &self,
        prefix: Ipv4Cidr,
        peer: &str,
        now_millis: i64,
    ) -> SecondaryKind {
        let mut states = self.states.lock().unwrap();
        let state = states
            .entry(prefix)
            .or_insert_with(|| PrefixClassifierState::new(now_millis));
        state.record_withdrawal(peer, now_millis);
        rules::evaluate(state, now_millis)
    }

    /// Drop state for prefixes that have gone quiet and never amounted to much.
    pub fn evict_idle(&self, now_millis: i64) -> usize {
        let mut states = self.states.lock().unwrap();
        let before = states.len();
        states.retain(|_, s| !s.is_evictable(now_millis, self.idle_eviction_ms, STICKY_RETENTION_MSGS));
        before - states.len()
    }

    pub fn active_prefix_count(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}

impl SecondaryClassifier for AnomalyClassifier {
    fn classify_announcement(
        &self,
        prefix: Ipv4Cidr,
        peer: &str,
        as_path: &[u32],
        communities: &[(u32, u32)],
        next_hop: &str,
        aggregator: Option<&str>,
        now_millis: i64,
    ) -> SecondaryKind {
        AnomalyClassifier::classify_announcement(
            self, prefix, peer, as_path, communities, next_hop, aggregator, now_millis,
        )
    }

    fn classify_withdrawal(&self, prefix: Ipv4Cidr, peer: &str, now_millis: i64) -> SecondaryKind {
        AnomalyClassifier::classify_withdrawal(self, prefix, peer, now_millis)
    }
}
