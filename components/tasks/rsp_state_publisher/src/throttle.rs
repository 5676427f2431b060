use compact_str::CompactString;
use parking_lot::Mutex;
use rsp_clock::RobotTime;
use std::collections::HashMap;
use std::time::Duration;

/// Rate limiter for diagnostics, keyed by subject: at most one pass per
/// `interval` for each key.
#[derive(Debug)]
pub struct Throttle {
    interval: RobotTime,
    last_pass: Mutex<HashMap<CompactString, RobotTime>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.into(),
            last_pass: Mutex::new(HashMap::new()),
        }
    }

    /// True when `key` has not passed within the interval before `now`.
    /// A `now` earlier than the last pass (time moved backwards) always passes.
    pub fn allow(&self, key: &str, now: RobotTime) -> bool {
        let mut last_pass = self.last_pass.lock();
        match last_pass.get_mut(key) {
            Some(last) if now >= *last && now - *last < self.interval => false,
            Some(last) => {
                *last = now;
                true
            }
            None => {
                last_pass.insert(key.into(), now);
                true
            }
        }
    }
}
