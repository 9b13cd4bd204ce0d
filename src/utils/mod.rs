mod parse;
mod time;

pub use parse::*;
pub use time::{ClockSource, FakeClock, SystemClock};
