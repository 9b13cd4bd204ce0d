//! Buffers geolocated events by city and paces them out as `Pulse`s for a
//! live renderer (§4.7): a 500 ms drain cycle schedules a shuffled batch,
//! and a per-tick draw hands ready pulses to the sink at a bounded rate.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use log::{trace, warn};
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::capability::{EventEmitter, VisualQueueSink};
use crate::models::{PrefixEvent, PrimaryKind, SecondaryKind};
use crate::store::SeenStore;
use crate::utils::ClockSource;

const DRAIN_INTERVAL_MS: i64 = 500;
const EMISSION_LAG_CAP_MS: i64 = 2_000;
const DEFAULT_PULSES_PER_TICK: usize = 60;
const BURST_PULSES_PER_TICK: usize = 300;
const VISUAL_QUEUE_THRESHOLD: usize = 3_000;
const VISUAL_QUEUE_CULL: usize = 6_000;
const PULSE_MAX_AGE_MS: i64 = 2_000;

/// Classification-derived display color. Anything the classifier flagged at
/// priority >= 1 takes precedence over the plain primary-kind color;
/// `CriticalLeak` is the only color that sets `is_flare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PulseColor {
    New,
    Update,
    Withdrawal,
    Gossip,
    Caution,
    Warning,
    CriticalLeak,
}

pub fn derive_color(primary: PrimaryKind, secondary: SecondaryKind) -> PulseColor {
    match secondary.priority() {
        3 => PulseColor::CriticalLeak,
        2 => PulseColor::Warning,
        1 => PulseColor::Caution,
        _ => match primary {
            PrimaryKind::New => PulseColor::New,
            PrimaryKind::Update => PulseColor::Update,
            PrimaryKind::Withdrawal => PulseColor::Withdrawal,
            PrimaryKind::Gossip => PulseColor::Gossip,
        },
    }
}

/// Radius for a pulse from its count, scaled to the renderer's resolution.
pub fn radius_for_count(count: u32, base: f64, growth: f64) -> f64 {
    let radius = base + (count.max(1) as f64).ln() * growth;
    radius.min(240.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    pub lat: f64,
    pub lng: f64,
    pub color: PulseColor,
    pub count: u32,
    pub scheduled_at: i64,
    pub is_flare: bool,
}

fn city_key(lat: f64, lng: f64) -> u64 {
    let lat_q = (lat * 100.0).round() as i64;
    let lng_q = (lng * 100.0).round() as i64;
    ((lat_q as u64) << 32) ^ (lng_q as u32 as u64)
}

struct BufferedCity {
    lat: f64,
    lng: f64,
    counts: HashMap<PulseColor, u32>,
}

struct PacerState {
    buffer: HashMap<u64, BufferedCity>,
    visual_queue: VecDeque<Pulse>,
    active_pulses: usize,
    next_emission_baseline: i64,
}

/// Owns the city buffer and scheduled visual queue behind one lock.
/// `record` is called per `PrefixEvent`; `drain` runs at 2 Hz; `tick` is
/// driven by the external renderer's own frame rate.
pub struct Pacer {
    clock: Arc<dyn ClockSource>,
    seen_store: Arc<SeenStore>,
    sink: Arc<dyn VisualQueueSink>,
    max_visual_queue: usize,
    max_active_pulses: usize,
    state: Mutex<PacerState>,
}

impl Pacer {
    pub fn new(
        clock: Arc<dyn ClockSource>,
        seen_store: Arc<SeenStore>,
        sink: Arc<dyn VisualQueueSink>,
        max_visual_queue: usize,
        max_active_pulses: usize,
    ) -> Self {
        let now = clock.now_millis();
        Self {
            clock,
            seen_store,
            sink,
            max_visual_queue,
            max_active_pulses,
            state: Mutex::new(PacerState {
                buffer: HashMap::new(),
                visual_queue: VecDeque::new(),
                active_pulses: 0,
                next_emission_baseline: now,
            }),
        }
    }

    /// Buffers one labeled event by its city, merging into the existing
    /// per-color count if that city already has entries this cycle.
    pub fn record(&self, event: &PrefixEvent) {
        let geo = match &event.geo {
            Some(geo) => geo,
            None => return,
        };
        let color = derive_color(event.primary_kind, event.secondary_kind);
        let key = city_key(geo.lat, geo.lng);
        let mut state = self.state.lock().unwrap();
        let city = state.buffer.entry(key).or_insert_with(|| BufferedCity {
            lat: geo.lat,
            lng: geo.lng,
            counts: HashMap::new(),
        });
        *city.counts.entry(color).or_insert(0) += 1;
    }

    /// 2 Hz drain: flushes `SeenStore`'s pending writes, turns the buffered
    /// cities into pulses, shuffles and spreads them across the next 500 ms
    /// window, then appends to the bounded visual queue.
    pub fn drain(&self) {
        self.seen_store.flush();
        let now = self.clock.now_millis();
        let mut state = self.state.lock().unwrap();

        if state.buffer.is_empty() {
            state.next_emission_baseline =
                (state.next_emission_baseline + DRAIN_INTERVAL_MS).min(now + EMISSION_LAG_CAP_MS);
            return;
        }

        let buffer = std::mem::take(&mut state.buffer);
        let mut pulses: Vec<Pulse> = Vec::new();
        for city in buffer.into_values() {
            for (color, count) in city.counts {
                pulses.push(Pulse {
                    lat: city.lat,
                    lng: city.lng,
                    color,
                    count,
                    scheduled_at: 0,
                    is_flare: color == PulseColor::CriticalLeak,
                });
            }
        }
        pulses.shuffle(&mut thread_rng());

        let baseline = state.next_emission_baseline;
        let n = pulses.len() as i64;
        for (i, pulse) in pulses.iter_mut().enumerate() {
            pulse.scheduled_at = baseline + (i as i64) * DRAIN_INTERVAL_MS / n;
        }

        if state.visual_queue.len() >= self.max_visual_queue {
            trace!("visual queue at capacity, dropping batch of {}", pulses.len());
        } else {
            let room = self.max_visual_queue - state.visual_queue.len();
            if pulses.len() > room {
                warn!("truncating pulse batch from {} to {} to fit visual queue", pulses.len(), room);
                pulses.truncate(room);
            }
            state.visual_queue.extend(pulses);
        }
        state.next_emission_baseline =
            (baseline + DRAIN_INTERVAL_MS).min(now + EMISSION_LAG_CAP_MS);
    }

    /// Pops ready pulses for one render frame: budget escalates under queue
    /// pressure, and stale pulses are dropped rather than forwarded.
    pub fn tick(&self) {
        let now = self.clock.now_millis();
        let popped: Vec<Pulse> = {
            let mut state = self.state.lock().unwrap();
            let len = state.visual_queue.len();
            let budget = if len > VISUAL_QUEUE_THRESHOLD {
                BURST_PULSES_PER_TICK
            } else {
                DEFAULT_PULSES_PER_TICK
            };
            let force = len > VISUAL_QUEUE_CULL;

            let mut popped = Vec::new();
            while popped.len() < budget {
                let ready = match state.visual_queue.front() {
                    Some(pulse) => force || pulse.scheduled_at <= now,
                    None => false,
                };
                if !ready {
                    break;
                }
                popped.push(state.visual_queue.pop_front().unwrap());
            }
            popped
        };

        for pulse in popped {
            if now - pulse.scheduled_at > PULSE_MAX_AGE_MS {
                continue;
            }
            let mut state = self.state.lock().unwrap();
            if state.active_pulses >= self.max_active_pulses {
                continue;
            }
            state.active_pulses += 1;
            drop(state);
            self.sink.push(pulse);
        }
    }

    /// Called once a pulse's animation has finished, freeing its slot in the
    /// active-pulse bound.
    pub fn retire_active(&self) {
        let mut state = self.state.lock().unwrap();
        state.active_pulses = state.active_pulses.saturating_sub(1);
    }

    pub fn visual_queue_len(&self) -> usize {
        self.state.lock().unwrap().visual_queue.len()
    }

    pub fn active_pulse_count(&self) -> usize {
        self.state.lock().unwrap().active_pulses
    }
}

impl EventEmitter for Pacer {
    fn emit(&self, event: PrefixEvent) {
        self.record(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, Prefix};
    use crate::store::LongestPrefixStore;
    use crate::utils::{FakeClock, Ipv4Cidr};
    use std::net::Ipv4Addr;
    use std::sync::Mutex as StdMutex;

    const TEST_MAX_VISUAL_QUEUE: usize = 15_000;
    const TEST_MAX_ACTIVE_PULSES: usize = 4_500;

    fn open_temp_seen_store() -> Arc<SeenStore> {
        let mut path = std::env::temp_dir();
        path.push(format!("bgp-pulse-pacer-test-{}", rand::random::<u64>()));
        Arc::new(SeenStore::new(LongestPrefixStore::open(&path, 1000, 0.2).unwrap()))
    }

    fn event(primary: PrimaryKind, secondary: SecondaryKind, lat: f64, lng: f64) -> PrefixEvent {
        PrefixEvent {
            prefix: Prefix::V4(Ipv4Cidr::new(u32::from(Ipv4Addr::new(1, 1, 1, 0)), 24)),
            origin_asn: Some(64512),
            geo: Some(GeoPoint { lat, lng, country: "US".into() }),
            primary_kind: primary,
            secondary_kind: secondary,
            observed_at_millis: 0,
        }
    }

    struct RecordingSink {
        pulses: StdMutex<Vec<Pulse>>,
    }
    impl RecordingSink {
        fn new() -> Self {
            Self { pulses: StdMutex::new(Vec::new()) }
        }
    }
    impl VisualQueueSink for RecordingSink {
        fn push(&self, pulse: Pulse) {
            self.pulses.lock().unwrap().push(pulse);
        }
    }

    #[test]
    fn test_derive_color_uses_secondary_priority_over_primary() {
        assert_eq!(derive_color(PrimaryKind::New, SecondaryKind::None), PulseColor::New);
        assert_eq!(derive_color(PrimaryKind::New, SecondaryKind::RouteLeak), PulseColor::CriticalLeak);
        assert_eq!(derive_color(PrimaryKind::Update, SecondaryKind::Babbling), PulseColor::Warning);
    }

    #[test]
    fn test_radius_clamps_at_240() {
        assert!(radius_for_count(1, 5.0, 2.0) >= 5.0);
        assert_eq!(radius_for_count(u32::MAX, 5.0, 2.0), 240.0);
    }

    #[test]
    fn test_record_and_drain_schedules_pulse() {
        let clock = Arc::new(FakeClock::new(1_000));
        let seen = open_temp_seen_store();
        let sink = Arc::new(RecordingSink::new());
        let pacer = Pacer::new(clock.clone(), seen, sink, TEST_MAX_VISUAL_QUEUE, TEST_MAX_ACTIVE_PULSES);
        pacer.record(&event(PrimaryKind::New, SecondaryKind::None, 40.0, -75.0));
        pacer.drain();
        assert_eq!(pacer.visual_queue_len(), 1);
    }

    #[test]
    fn test_tick_pops_only_ready_pulses() {
        let clock = Arc::new(FakeClock::new(0));
        let seen = open_temp_seen_store();
        let sink = Arc::new(RecordingSink::new());
        let pacer = Pacer::new(clock.clone(), seen, sink.clone(), TEST_MAX_VISUAL_QUEUE, TEST_MAX_ACTIVE_PULSES);
        // Three distinct cities in one batch get spread across the 500ms
        // window; only the earliest-scheduled should be ready at drain time.
        for i in 0..3 {
            pacer.record(&event(PrimaryKind::New, SecondaryKind::None, i as f64, 0.0));
        }
        pacer.drain();
        assert_eq!(pacer.visual_queue_len(), 3);
        pacer.tick();
        let popped_immediately = sink.pulses.lock().unwrap().len();
        assert!(
            (1..3).contains(&popped_immediately),
            "only pulses scheduled at or before the drain instant should pop"
        );
        clock.advance_millis(600);
        pacer.tick();
        assert_eq!(sink.pulses.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_critical_leak_sets_flare() {
        let clock = Arc::new(FakeClock::new(0));
        let seen = open_temp_seen_store();
        let sink = Arc::new(RecordingSink::new());
        let pacer = Pacer::new(clock.clone(), seen, sink.clone(), TEST_MAX_VISUAL_QUEUE, TEST_MAX_ACTIVE_PULSES);
        pacer.record(&event(PrimaryKind::Update, SecondaryKind::RouteLeak, 40.0, -75.0));
        pacer.drain();
        clock.advance_millis(600);
        pacer.tick();
        let pulses = sink.pulses.lock().unwrap();
        assert!(pulses[0].is_flare);
    }

    #[test]
    fn test_active_pulse_bound_drops_when_full() {
        // Keep the queue deep enough past VISUAL_QUEUE_CULL, for enough ticks,
        // that every pop is force-popped regardless of its schedule: with the
        // clock never advanced, only a handful of pulses would otherwise be
        // "ready" per the usual schedule check.
        let total = VISUAL_QUEUE_CULL + TEST_MAX_ACTIVE_PULSES + 1;
        let clock = Arc::new(FakeClock::new(0));
        let seen = open_temp_seen_store();
        let sink = Arc::new(RecordingSink::new());
        let pacer = Pacer::new(clock, seen, sink.clone(), TEST_MAX_VISUAL_QUEUE, TEST_MAX_ACTIVE_PULSES);
        for i in 0..total {
            pacer.record(&event(PrimaryKind::New, SecondaryKind::None, i as f64, 0.0));
            pacer.drain();
        }
        let ticks_needed = TEST_MAX_ACTIVE_PULSES / BURST_PULSES_PER_TICK;
        for _ in 0..ticks_needed {
            pacer.tick();
        }
        assert_eq!(pacer.active_pulse_count(), TEST_MAX_ACTIVE_PULSES);
        assert_eq!(sink.pulses.lock().unwrap().len(), TEST_MAX_ACTIVE_PULSES);
    }
}
