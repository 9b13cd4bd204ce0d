use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Narrow capability trait every time-dependent component depends on, rather than
/// reaching for `Instant::now()`/`Utc::now()` directly. Lets tests drive classifier
/// and shaper scenarios deterministically without sleeping.
pub trait ClockSource: Send + Sync {
    /// Milliseconds since the Unix epoch. Monotonic enough for windowing; not
    /// required to be wall-clock accurate.
    fn now_millis(&self) -> i64;
}

/// Real clock, backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_millis(&self) -> i64 {
        let dur = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        dur.as_millis() as i64
    }
}

/// Test clock that only advances when told to. Shared via `Arc<FakeClock>` across
/// the component under test and the test body.
#[derive(Debug, Default)]
pub struct FakeClock {
    millis: AtomicI64,
}

impl FakeClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, delta: i64) {
        self.advance_millis(delta * 1000);
    }

    pub fn set_millis(&self, value: i64) {
        self.millis.store(value, Ordering::SeqCst);
    }
}

impl ClockSource for FakeClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
