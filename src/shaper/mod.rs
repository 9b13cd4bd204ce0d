use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::trace;

use crate::capability::{EventEmitter, GeoResolveQuery, SeenStoreQuery, SecondaryClassifier};
use crate::models::{Announcement, MessageKind, PrefixEvent, PrimaryKind, RawMessage, SecondaryKind};
use crate::utils::{ClockSource, Ipv4Cidr};

/// Opportunistic pruning of `recently_seen` kicks in once it holds this many
/// entries, and runs every `PRUNE_EVERY_N_TICKS` 1 Hz ticks.
const PRUNE_THRESHOLD: usize = 500_000;
const PRUNE_EVERY_N_TICKS: u32 = 30;
const PRUNE_MAX_AGE_MS: i64 = 5 * 60 * 1000;

#[derive(Clone, Copy, PartialEq, Eq)]
struct RecentEntry {
    kind: PrimaryKind,
    at: i64,
}

struct PendingWithdrawal {
    due_at: i64,
    peer: String,
}

struct ShaperState {
    recently_seen: HashMap<Ipv4Cidr, RecentEntry>,
    pending_withdrawals: HashMap<Ipv4Cidr, PendingWithdrawal>,
    tick_count: u32,
}

/// Turns the raw upstream feed into labeled `PrefixEvent`s (§4.4): resolves
/// withdrawal/announcement dedup against a 15 s window and a 10 s
/// withdrawal grace period, consults the secondary classifier, then
/// geolocates and emits.
///
/// All state lives behind one lock; both `process_message` and `tick` take
/// it briefly.
pub struct EventShaper {
    clock: Arc<dyn ClockSource>,
    seen: Arc<dyn SeenStoreQuery>,
    geo: Arc<dyn GeoResolveQuery>,
    classifier: Arc<dyn SecondaryClassifier>,
    emitter: Arc<dyn EventEmitter>,
    dedupe_window_ms: i64,
    withdrawal_grace_ms: i64,
    state: Mutex<ShaperState>,
}

impl EventShaper {
    pub fn new(
        clock: Arc<dyn ClockSource>,
        seen: Arc<dyn SeenStoreQuery>,
        geo: Arc<dyn GeoResolveQuery>,
        classifier: Arc<dyn SecondaryClassifier>,
        emitter: Arc<dyn EventEmitter>,
        dedupe_window: Duration,
        withdrawal_grace: Duration,
    ) -> Self {
        Self {
            clock,
            seen,
            geo,
            classifier,
            emitter,
            dedupe_window_ms: dedupe_window.as_millis() as i64,
            withdrawal_grace_ms: withdrawal_grace.as_millis() as i64,
            state: Mutex::new(ShaperState {
                recently_seen: HashMap::new(),
                pending_withdrawals: HashMap::new(),
                tick_count: 0,
            }),
        }
    }

    /// Processes one `RawMessage`: withdrawals before announcements (§8 invariant 2).
    pub fn process_message(&self, msg: &RawMessage) {
        if msg.kind != MessageKind::Update {
            return;
        }
        for prefix in &msg.withdrawals {
            if let Some(cidr) = prefix.as_v4() {
                self.process_withdrawal(cidr, &msg.peer);
            }
        }
        for announcement in &msg.announcements {
            self.process_announcement(msg, announcement);
        }
    }

    fn process_withdrawal(&self, prefix: Ipv4Cidr, peer: &str) {
        let now = self.clock.now_millis();
        let secondary = self.classifier.classify_withdrawal(prefix, peer, now);
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.recently_seen.get(&prefix) {
            if entry.kind == PrimaryKind::Withdrawal && now - entry.at < self.dedupe_window_ms {
                self.emit(prefix, PrimaryKind::Gossip, None, secondary, now);
                return;
            }
        }
        state.pending_withdrawals.insert(
            prefix,
            PendingWithdrawal { due_at: now + self.withdrawal_grace_ms, peer: peer.to_string() },
        );
    }

    fn process_announcement(&self, msg: &RawMessage, announcement: &Announcement) {
        let now = self.clock.now_millis();
        let origin_asn = msg.origin_asn();
        for prefix in &announcement.prefixes {
            let cidr = match prefix.as_v4() {
                Some(cidr) => cidr,
                None => continue,
            };
            let secondary = self.classifier.classify_announcement(
                cidr,
                &msg.peer,
                &msg.as_path,
                &msg.communities,
                &announcement.next_hop,
                msg.aggregator.as_deref(),
                now,
            );
            let mut state = self.state.lock().unwrap();

            if let Some(entry) = state.recently_seen.get(&cidr).copied() {
                if entry.kind == PrimaryKind::Withdrawal && now - entry.at < self.dedupe_window_ms
                {
                    state
                        .recently_seen
                        .insert(cidr, RecentEntry { kind: PrimaryKind::Update, at: now });
                    drop(state);
                    self.emit(cidr, PrimaryKind::Update, origin_asn, secondary, now);
                    continue;
                }
                if now - entry.at < self.dedupe_window_ms {
                    drop(state);
                    self.emit(cidr, PrimaryKind::Gossip, origin_asn, secondary, now);
                    continue;
                }
            }

            if state.pending_withdrawals.remove(&cidr).is_some() {
                state
                    .recently_seen
                    .insert(cidr, RecentEntry { kind: PrimaryKind::Update, at: now });
                drop(state);
                self.emit(cidr, PrimaryKind::Update, origin_asn, secondary, now);
                continue;
            }

            drop(state);
            let is_seen = self.seen.is_seen(cidr);
            let primary = if is_seen { PrimaryKind::Update } else { PrimaryKind::New };
            if !is_seen {
                if let Some(asn) = origin_asn {
                    self.seen.record(cidr, asn);
                }
            }
            self.state
                .lock()
                .unwrap()
                .recently_seen
                .insert(cidr, RecentEntry { kind: primary, at: now });
            self.emit(cidr, primary, origin_asn, secondary, now);
        }
    }

    /// 1 Hz tick: drains due pending withdrawals and, every 30th call,
    /// prunes stale `recently_seen` entries.
    pub fn tick(&self) {
        let now = self.clock.now_millis();
        let due: Vec<(Ipv4Cidr, String)> = {
            let mut state = self.state.lock().unwrap();
            let due: Vec<(Ipv4Cidr, String)> = state
                .pending_withdrawals
                .iter()
                .filter(|(_, w)| w.due_at <= now)
                .map(|(prefix, w)| (*prefix, w.peer.clone()))
                .collect();
            for (prefix, _) in &due {
                state.pending_withdrawals.remove(prefix);
                state
                    .recently_seen
                    .insert(*prefix, RecentEntry { kind: PrimaryKind::Withdrawal, at: now });
            }
            state.tick_count += 1;
            if state.tick_count >= PRUNE_EVERY_N_TICKS
                && state.recently_seen.len() >= PRUNE_THRESHOLD
            {
                state.tick_count = 0;
                let before = state.recently_seen.len();
                state
                    .recently_seen
                    .retain(|_, entry| now - entry.at < PRUNE_MAX_AGE_MS);
                trace!(
                    "EventShaper pruned {} stale entries",
                    before - state.recently_seen.len()
                );
            }
            due
        };
        for (prefix, peer) in due {
            let secondary = self.classifier.classify_withdrawal(prefix, &peer, now);
            self.emit(prefix, PrimaryKind::Withdrawal, None, secondary, now);
        }
    }

    fn emit(
        &self,
        prefix: Ipv4Cidr,
        primary_kind: PrimaryKind,
        origin_asn: Option<u32>,
        secondary_kind: SecondaryKind,
        now: i64,
    ) {
        let geo = self.geo.resolve(prefix.network);
        self.emitter.emit(PrefixEvent {
            prefix: crate::models::Prefix::V4(prefix),
            origin_asn,
            geo,
            primary_kind,
            secondary_kind,
            observed_at_millis: now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use crate::utils::FakeClock;
    use std::net::Ipv4Addr;
    use std::sync::Mutex as StdMutex;

    fn cidr(a: u8, b: u8, c: u8, d: u8, mask: u8) -> Ipv4Cidr {
        Ipv4Cidr::new(u32::from(Ipv4Addr::new(a, b, c, d)), mask)
    }

    struct FakeSeenStore {
        seen: StdMutex<std::collections::HashSet<Ipv4Cidr>>,
    }
    impl FakeSeenStore {
        fn new() -> Self {
            Self { seen: StdMutex::new(std::collections::HashSet::new()) }
        }
    }
    impl SeenStoreQuery for FakeSeenStore {
        fn is_seen(&self, prefix: Ipv4Cidr) -> bool {
            self.seen.lock().unwrap().contains(&prefix)
        }
        fn record(&self, prefix: Ipv4Cidr, _origin_asn: u32) {
            self.seen.lock().unwrap().insert(prefix);
        }
    }

    struct FakeGeo;
    impl GeoResolveQuery for FakeGeo {
        fn resolve(&self, _ip: u32) -> Option<GeoPoint> {
            None
        }
    }

    /// Always reports `SecondaryKind::None`; the shaper's own dedup/geo logic
    /// is what these tests exercise, not the classifier's rule table.
    struct NoopClassifier;
    impl SecondaryClassifier for NoopClassifier {
        fn classify_announcement(
            &self,
            _prefix: Ipv4Cidr,
            _peer: &str,
            _as_path: &[u32],
            _communities: &[(u32, u32)],
            _next_hop: &str,
            _aggregator: Option<&str>,
            _now_millis: i64,
        ) -> SecondaryKind {
            SecondaryKind::None
        }

        fn classify_withdrawal(&self, _prefix: Ipv4Cidr, _peer: &str, _now_millis: i64) -> SecondaryKind {
            SecondaryKind::None
        }
    }

    struct RecordingEmitter {
        events: StdMutex<Vec<PrefixEvent>>,
    }
    impl RecordingEmitter {
        fn new() -> Self {
            Self { events: StdMutex::new(Vec::new()) }
        }
    }
    impl EventEmitter for RecordingEmitter {
        fn emit(&self, event: PrefixEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn harness() -> (Arc<FakeClock>, Arc<RecordingEmitter>, EventShaper) {
        let clock = Arc::new(FakeClock::new(0));
        let seen = Arc::new(FakeSeenStore::new());
        let geo = Arc::new(FakeGeo);
        let classifier = Arc::new(NoopClassifier);
        let emitter = Arc::new(RecordingEmitter::new());
        let shaper = EventShaper::new(
            clock.clone(),
            seen,
            geo,
            classifier,
            emitter.clone(),
            Duration::from_secs(15),
            Duration::from_secs(10),
        );
        (clock, emitter, shaper)
    }

    fn raw_message(cidr: Ipv4Cidr, origin_asn: u32) -> RawMessage {
        RawMessage {
            kind: MessageKind::Update,
            peer: "192.0.2.1".into(),
            announcements: vec![Announcement {
                next_hop: "10.0.0.1".into(),
                prefixes: vec![crate::models::Prefix::V4(cidr)],
            }],
            withdrawals: vec![],
            as_path: vec![64512, origin_asn],
            communities: vec![],
            aggregator: None,
            timestamp_millis: 0,
        }
    }

    #[test]
    fn test_first_announcement_is_new() {
        let (_clock, emitter, shaper) = harness();
        let msg = raw_message(cidr(1, 1, 1, 0, 24), 64512);
        shaper.process_announcement(&msg, &msg.announcements[0]);
        let events = emitter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].primary_kind, PrimaryKind::New);
        assert_eq!(events[0].secondary_kind, SecondaryKind::None);
    }

    #[test]
    fn test_repeat_within_window_is_gossip() {
        let (_clock, emitter, shaper) = harness();
        let msg = raw_message(cidr(1, 1, 1, 0, 24), 64512);
        shaper.process_announcement(&msg, &msg.announcements[0]);
        shaper.process_announcement(&msg, &msg.announcements[0]);
        let events = emitter.events.lock().unwrap();
        assert_eq!(events[1].primary_kind, PrimaryKind::Gossip);
    }

    #[test]
    fn test_announcement_within_grace_of_withdrawal_is_update() {
        let (clock, emitter, shaper) = harness();
        let prefix = cidr(1, 1, 1, 0, 24);
        shaper.process_withdrawal(prefix, "192.0.2.1");
        clock.advance_secs(1);
        let msg = raw_message(prefix, 64512);
        shaper.process_announcement(&msg, &msg.announcements[0]);
        let events = emitter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].primary_kind, PrimaryKind::Update);
    }

    #[test]
    fn test_withdrawal_fires_after_grace_via_tick() {
        let (clock, emitter, shaper) = harness();
        let prefix = cidr(1, 1, 1, 0, 24);
        shaper.process_withdrawal(prefix, "192.0.2.1");
        clock.advance_secs(11);
        shaper.tick();
        let events = emitter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].primary_kind, PrimaryKind::Withdrawal);
    }

    #[test]
    fn test_withdrawal_repeat_within_window_is_gossip() {
        let (clock, emitter, shaper) = harness();
        let prefix = cidr(1, 1, 1, 0, 24);
        shaper.process_withdrawal(prefix, "192.0.2.1");
        clock.advance_secs(11);
        shaper.tick();
        clock.advance_secs(1);
        shaper.process_withdrawal(prefix, "192.0.2.1");
        let events = emitter.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].primary_kind, PrimaryKind::Gossip);
    }

    #[test]
    fn test_secondary_kind_from_classifier_is_attached() {
        struct RouteLeakClassifier;
        impl SecondaryClassifier for RouteLeakClassifier {
            fn classify_announcement(
                &self,
                _prefix: Ipv4Cidr,
                _peer: &str,
                _as_path: &[u32],
                _communities: &[(u32, u32)],
                _next_hop: &str,
                _aggregator: Option<&str>,
                _now_millis: i64,
            ) -> SecondaryKind {
                SecondaryKind::RouteLeak
            }
            fn classify_withdrawal(&self, _prefix: Ipv4Cidr, _peer: &str, _now_millis: i64) -> SecondaryKind {
                SecondaryKind::None
            }
        }
        let clock = Arc::new(FakeClock::new(0));
        let seen = Arc::new(FakeSeenStore::new());
        let geo = Arc::new(FakeGeo);
        let classifier = Arc::new(RouteLeakClassifier);
        let emitter = Arc::new(RecordingEmitter::new());
        let shaper = EventShaper::new(
            clock,
            seen,
            geo,
            classifier,
            emitter.clone(),
            Duration::from_secs(15),
            Duration::from_secs(10),
        );
        let msg = raw_message(cidr(1, 1, 1, 0, 24), 64512);
        shaper.process_announcement(&msg, &msg.announcements[0]);
        let events = emitter.events.lock().unwrap();
        assert_eq!(events[0].secondary_kind, SecondaryKind::RouteLeak);
    }
}
