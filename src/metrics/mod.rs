//! Windowed counters feeding the live dashboard (§4.6). `MetricsAggregator`
//! is itself an `EventEmitter`, so it sits on the same fan-out as the Pacer.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::beacon;
use crate::capability::EventEmitter;
use crate::models::{PrefixEvent, PrimaryKind, SecondaryKind};
use crate::utils::ClockSource;

const SNAPSHOT_RING_SIZE: usize = 60;
const BEACON_WINDOW_MS: i64 = 10_000;

/// One second's worth of counters, taken off the live window at snapshot time.
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    pub primary_counts: HashMap<PrimaryKind, u64>,
    pub secondary_counts: HashMap<SecondaryKind, u64>,
    pub beacon_matches: u64,
    pub total: u64,
    pub taken_at_millis: i64,
}

#[derive(Default)]
struct Window {
    primary_counts: HashMap<PrimaryKind, u64>,
    secondary_counts: HashMap<SecondaryKind, u64>,
    beacon_matches: u64,
    total: u64,
}

struct AggregatorState {
    window: Window,
    history: VecDeque<MetricSnapshot>,
    country_activity: HashMap<String, u64>,
    country_activity_started_at: i64,
    beacon_recent: VecDeque<(i64, bool)>,
}

/// Maintains per-second primary/secondary counters, a 60-slot snapshot
/// history, a country-activity tally reset every UI tick, and a rolling
/// beacon-match percentage. Everything sits behind one lock (§4.6).
pub struct MetricsAggregator {
    clock: Arc<dyn ClockSource>,
    ui_tick_ms: i64,
    state: Mutex<AggregatorState>,
}

impl MetricsAggregator {
    pub fn new(clock: Arc<dyn ClockSource>, ui_tick: Duration) -> Self {
        let now = clock.now_millis();
        let mut history = VecDeque::with_capacity(SNAPSHOT_RING_SIZE);
        history.resize_with(SNAPSHOT_RING_SIZE, MetricSnapshot::default);
        Self {
            clock,
            ui_tick_ms: ui_tick.as_millis() as i64,
            state: Mutex::new(AggregatorState {
                window: Window::default(),
                history,
                country_activity: HashMap::new(),
                country_activity_started_at: now,
                beacon_recent: VecDeque::new(),
            }),
        }
    }

    /// 1 Hz tick: snapshots and zeroes the current window, and rolls over
    /// `country_activity` once a full UI tick has elapsed.
    pub fn snapshot_tick(&self) {
        let now = self.clock.now_millis();
        let mut state = self.state.lock().unwrap();
        let window = std::mem::take(&mut state.window);
        state.history.push_back(MetricSnapshot {
            primary_counts: window.primary_counts,
            secondary_counts: window.secondary_counts,
            beacon_matches: window.beacon_matches,
            total: window.total,
            taken_at_millis: now,
        });
        while state.history.len() > SNAPSHOT_RING_SIZE {
            state.history.pop_front();
        }
        if now - state.country_activity_started_at >= self.ui_tick_ms {
            state.country_activity.clear();
            state.country_activity_started_at = now;
        }
    }

    pub fn recent_snapshots(&self) -> Vec<MetricSnapshot> {
        self.state.lock().unwrap().history.iter().cloned().collect()
    }

    pub fn country_activity(&self) -> HashMap<String, u64> {
        self.state.lock().unwrap().country_activity.clone()
    }

    /// Fraction of the last 10 s of messages that matched a beacon prefix, as
    /// a percentage bounded to `[0, 100]`.
    pub fn display_beacon_percent(&self) -> f64 {
        let state = self.state.lock().unwrap();
        let total = state.beacon_recent.len();
        if total == 0 {
            return 0.0;
        }
        let beacons = state.beacon_recent.iter().filter(|(_, is_beacon)| *is_beacon).count();
        (beacons as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

impl EventEmitter for MetricsAggregator {
    fn emit(&self, event: PrefixEvent) {
        let now = self.clock.now_millis();
        let is_beacon = beacon::is_beacon(&event.prefix.to_string());
        let mut state = self.state.lock().unwrap();

        *state.window.primary_counts.entry(event.primary_kind).or_insert(0) += 1;
        if event.secondary_kind != SecondaryKind::None {
            *state.window.secondary_counts.entry(event.secondary_kind).or_insert(0) += 1;
        }
        if is_beacon {
            state.window.beacon_matches += 1;
        }
        state.window.total += 1;

        if let Some(geo) = &event.geo {
            if !geo.country.is_empty() {
                *state.country_activity.entry(geo.country.clone()).or_insert(0) += 1;
            }
        }

        state.beacon_recent.push_back((now, is_beacon));
        while let Some(&(t, _)) = state.beacon_recent.front() {
            if now - t > BEACON_WINDOW_MS {
                state.beacon_recent.pop_front();
            } else {
                break;
            }
        }
    }
}
