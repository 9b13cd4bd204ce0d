use std::time::Duration;

/// Doubling reconnect backoff with a ceiling, reset on a successful message
/// (§4.8). Pure/sleep-free so it's directly unit-testable.
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial }
    }

    /// Returns the wait to use for the upcoming reconnect attempt, then
    /// doubles (capped at `max`) for next time.
    pub fn next(&mut self) -> Duration {
        let wait = self.current;
        self.current = (self.current * 2).min(self.max);
        wait
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
