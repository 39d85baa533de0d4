use std::{fmt, time};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
/// Timestamp consisting of a seconds and a microseconds component
pub struct Timestamp {
    pub sec: i64,
    pub usec: i64,
}

impl Timestamp {
    /// Returns a timestamp representation
    ///
    /// # Arguments
    ///
    /// * `sec` - Seconds
    /// * `usec` - Microseconds
    ///
    /// # Example
    ///
    /// ```
    /// use v4l2_mmap::Timestamp;
    /// let ts = Timestamp::new(5, 5);
    /// ```
    pub fn new(sec: i64, usec: i64) -> Self {
        Timestamp { sec, usec }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let floating: f64 = self.sec as f64 + self.usec as f64 / 1_000_000.0;
        write!(f, "{} [s]", floating)
    }
}

/// `timeval` members as read from a record
impl From<(i64, i64)> for Timestamp {
    fn from(tv: (i64, i64)) -> Self {
        Timestamp::new(tv.0, tv.1)
    }
}

impl From<Timestamp> for (i64, i64) {
    fn from(ts: Timestamp) -> Self {
        (ts.sec, ts.usec)
    }
}

impl From<time::Duration> for Timestamp {
    fn from(duration: time::Duration) -> Self {
        Timestamp::new(duration.as_secs() as i64, duration.subsec_micros() as i64)
    }
}

impl From<Timestamp> for time::Duration {
    fn from(ts: Timestamp) -> Self {
        time::Duration::new(ts.sec.max(0) as u64, (ts.usec.max(0) * 1000) as u32)
    }
}
