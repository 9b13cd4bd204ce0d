use once_cell::sync::Lazy;
use std::collections::HashSet;

use super::state::PrefixClassifierState;
use crate::models::SecondaryKind;

/// A prefix isn't evaluated at all until it has accumulated this much
/// history, to avoid thrashing labels on a prefix we've barely seen.
const EVALUATION_FLOOR_MS: i64 = 120_000;
const EVALUATION_FLOOR_MSGS: u32 = 5;

/// How long a priority-2 label suppresses downgrade to a lower-priority one.
const STICKY_WINDOW_MS: i64 = 60_000;

/// Horizon for the babbling per-peer rate: a peer's message volume is judged
/// against this short window rather than the prefix's whole lifetime, so a
/// peer that front-loads `total_msgs` worth of traffic well inside it reads
/// as babbling even if the prefix itself has been around much longer.
const BABBLING_RATE_WINDOW_SECS: f64 = 2.0;

/// Tier-1 transit ASNs; seeing one of these, then a non-tier-1, then one
/// again in the same observed path is the route-leak heuristic (§4.5).
static TIER1_ASNS: Lazy<HashSet<u32>> = Lazy::new(|| {
    [
        174, 209, 286, 701, 1239, 1299, 2828, 2914, 3257, 3320, 3356, 3491, 5511, 6453, 6461,
        6762, 6830, 6939, 7018, 12956,
    ]
    .into_iter()
    .collect()
});

fn has_leak_subsequence(path: &[u32]) -> bool {
    let mut state = 0u8;
    for asn in path {
        let is_tier1 = TIER1_ASNS.contains(asn);
        state = match (state, is_tier1) {
            (0, true) => 1,
            (1, false) => 2,
            (2, true) => return true,
            (s, _) => s,
        };
    }
    false
}

/// Evaluate the rolling summary against the priority-ordered rule table,
/// then apply/update stickiness (§4.5) and return the label to emit.
pub fn evaluate(state: &mut PrefixClassifierState, now: i64) -> SecondaryKind {
    let elapsed = state.elapsed_ms(now);
    let stable = elapsed >= EVALUATION_FLOOR_MS || state.total_msgs >= EVALUATION_FLOOR_MSGS;
    let raw = if stable { evaluate_raw(state, elapsed) } else { SecondaryKind::None };

    if let Some(sticky) = state.sticky_label {
        let sticky_active = state.sticky_until.map_or(true, |until| now < until);
        if sticky_active && sticky.priority() >= raw.priority() {
            return sticky;
        }
    }

    if raw.priority() >= 2 {
        state.sticky_label = Some(raw);
        state.sticky_until = if raw.priority() >= 3 {
            None
        } else {
            Some(now + STICKY_WINDOW_MS)
        };
    }
    raw
}

fn evaluate_raw(state: &PrefixClassifierState, elapsed_ms: i64) -> SecondaryKind {
    let elapsed_secs = (elapsed_ms as f64 / 1000.0).max(1.0);

    if state
        .peers
        .values()
        .any(|peer| has_leak_subsequence(&peer.as_path))
    {
        return SecondaryKind::RouteLeak;
    }

    if state.total_withdrawals >= 3 && state.total_announcements == 0 && elapsed_ms >= 60_000 {
        return SecondaryKind::Outage;
    }

    if state.total_withdrawals > 5
        && (state.total_announcements as f64 / state.total_withdrawals as f64) < 2.5
    {
        return SecondaryKind::LinkFlap;
    }

    if state.total_msgs >= 10
        && state.churn.values().any(|c| {
            let rate_window = elapsed_secs.min(BABBLING_RATE_WINDOW_SECS);
            c.msg_count as f64 / rate_window >= 5.0
        })
    {
        return SecondaryKind::Babbling;
    }

    let total_aggregator_changes: u32 = state.churn.values().map(|c| c.aggregator_changes).sum();
    if total_aggregator_changes > 10 && total_aggregator_changes as f64 / elapsed_secs > 0.05 {
        return SecondaryKind::AggregatorFlap;
    }

    let total_next_hop_changes: u32 = state.churn.values().map(|c| c.next_hop_changes).sum();
    let total_path_changes: u32 = state.churn.values().map(|c| c.path_changes).sum();
    if state.unique_next_hops.len() > 1 && total_next_hop_changes >= 5 && total_path_changes <= 1
    {
        return SecondaryKind::NextHopOscillation;
    }

    let total_increases: u32 = state.churn.values().map(|c| c.path_length_increases).sum();
    let total_decreases: u32 = state.churn.values().map(|c| c.path_length_decreases).sum();

    if total_increases >= 3
        && state.total_withdrawals >= 1
        && state.churn.values().any(|c| c.has_monotonic_increase_run())
    {
        return SecondaryKind::PathHunting;
    }

    if total_increases >= 2 && total_decreases >= 2 {
        return SecondaryKind::PathLengthOscillation;
    }

    let total_community_changes: u32 = state.churn.values().map(|c| c.community_changes).sum();
    if total_community_changes >= 5 {
        return SecondaryKind::PolicyChurn;
    }

    let peer_count = state.peers.len();
    if peer_count >= 30 {
        let average_rate = state.total_msgs as f64 / elapsed_secs / peer_count as f64;
        if average_rate <= 1.0 {
            return SecondaryKind::Discovery;
        }
    }

    SecondaryKind::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_leak_subsequence() {
        assert!(has_leak_subsequence(&[174, 64512, 209]));
        assert!(!has_leak_subsequence(&[174, 209]));
        assert!(!has_leak_subsequence(&[64512, 64513]));
    }

    #[test]
    fn test_below_evaluation_floor_is_none() {
        let mut state = PrefixClassifierState::new(0);
        state.record_announcement("peerA", vec![1, 2], vec![], "10.0.0.1".into(), None, 1000);
        assert_eq!(evaluate(&mut state, 1000), SecondaryKind::None);
    }

    #[test]
    fn test_outage_detected_after_withdrawals_with_no_announcements() {
        let mut state = PrefixClassifierState::new(0);
        for (peer, t) in [("p1", 10_000), ("p2", 30_000), ("p3", 70_000)] {
            state.record_withdrawal(peer, t);
        }
        assert_eq!(evaluate(&mut state, 70_000), SecondaryKind::Outage);
    }

    #[test]
    fn test_route_leak_is_sticky_for_full_window() {
        let mut state = PrefixClassifierState::new(0);
        state.record_announcement(
            "peerA",
            vec![174, 64512, 209],
            vec![],
            "10.0.0.1".into(),
            None,
            200_000,
        );
        assert_eq!(evaluate(&mut state, 200_000), SecondaryKind::RouteLeak);
        // Even long after, with no further messages, the leak stays sticky.
        assert_eq!(evaluate(&mut state, 10_000_000), SecondaryKind::RouteLeak);
    }

    #[test]
    fn test_discovery_requires_many_low_rate_peers() {
        let mut state = PrefixClassifierState::new(0);
        for i in 0..30 {
            state.record_announcement(
                &format!("peer{}", i),
                vec![64512],
                vec![],
                "10.0.0.1".into(),
                None,
                130_000,
            );
        }
        assert_eq!(evaluate(&mut state, 130_000), SecondaryKind::Discovery);
    }

    #[test]
    fn test_babbling_after_eleven_announcements_one_per_second() {
        let mut state = PrefixClassifierState::new(0);
        let mut result = SecondaryKind::None;
        for t in 0..=10 {
            let now = t * 1_000;
            state.record_announcement("peer1", vec![100, 200], vec![], "10.0.0.1".into(), None, now);
            result = evaluate(&mut state, now);
        }
        assert_eq!(result, SecondaryKind::Babbling);
    }

    #[test]
    fn test_link_flap_after_repeated_withdraw_announce_cycles() {
        let mut state = PrefixClassifierState::new(0);
        let peers = ["peer0", "peer1", "peer2", "peer3", "peer4"];
        let mut result = SecondaryKind::None;
        for cycle in 0..10 {
            let peer = peers[cycle % peers.len()];
            let t = cycle as i64 * 20_000;
            state.record_withdrawal(peer, t);
            state.record_announcement(peer, vec![100, 200], vec![], "10.0.0.1".into(), None, t + 1);
            result = evaluate(&mut state, t + 1);
        }
        assert_eq!(result, SecondaryKind::LinkFlap);
    }

    #[test]
    fn test_path_length_oscillation_after_alternating_path_lengths() {
        let mut state = PrefixClassifierState::new(0);
        let short_path = vec![100, 200];
        let long_path = vec![100, 150, 200];
        let mut result = SecondaryKind::None;
        for i in 0..8 {
            let path = if i % 2 == 0 { short_path.clone() } else { long_path.clone() };
            let t = i as i64 * 30_000;
            state.record_announcement("peer1", path, vec![], "10.0.0.1".into(), None, t);
            result = evaluate(&mut state, t);
        }
        assert_eq!(result, SecondaryKind::PathLengthOscillation);
    }
}
