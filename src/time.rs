// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use std::fmt::{Debug, Formatter};
use std::time::{Duration, SystemTime};

/// Time as unsigned 64-bit ms since unix epoch. This is what both cache tiers store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SimpleTime {
    unix_millis: u64,
}

impl SimpleTime {
    pub const UNIX_EPOCH: SimpleTime = SimpleTime::from_unix_millis(0);

    #[inline(always)]
    pub const fn from_unix_millis(unix_millis: u64) -> Self {
        Self { unix_millis }
    }

    #[inline(always)]
    pub const fn as_epoch_millis(&self) -> u64 {
        self.unix_millis
    }

    /// Current time as per the system clock
    pub fn now() -> Self {
        let duration_since_epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default(); // a clock set before 1970 gets a zero
        Self::from_unix_millis(u64::try_from(duration_since_epoch.as_millis()).unwrap_or(u64::MAX))
    }

    /// Duration since some earlier time with millisecond precision, or zero if result was negative
    #[inline(always)]
    pub fn duration_since(&self, earlier: Self) -> Duration {
        self.unix_millis
            .checked_sub(earlier.unix_millis)
            .map(Duration::from_millis)
            .unwrap_or_default()
    }

    /// This time shifted forward, saturating at the far future
    pub fn saturating_add(&self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self::from_unix_millis(self.unix_millis.saturating_add(millis))
    }

    /// Read from an sqlite INTEGER column. Negative values clamp to the epoch.
    pub fn from_db(unix_millis: i64) -> Self {
        Self::from_unix_millis(u64::try_from(unix_millis).unwrap_or_default())
    }

    /// Value for an sqlite INTEGER column
    pub fn as_db(&self) -> i64 {
        i64::try_from(self.unix_millis).unwrap_or(i64::MAX)
    }

    /// Convert to a real timestamp for display. `None` only for times past year 9999.
    pub fn to_timestamp(&self) -> Option<jiff::Timestamp> {
        jiff::Timestamp::from_millisecond(self.as_db()).ok()
    }
}

impl Debug for SimpleTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_timestamp() {
            Some(timestamp) => write!(f, "{timestamp}"),
            None => write!(f, "{}ms", self.unix_millis),
        }
    }
}

/// Source of "now" for everything that ages cache entries. Injected so tests can move time by hand.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> SimpleTime;
}

/// The real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SimpleTime {
        SimpleTime::now()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
