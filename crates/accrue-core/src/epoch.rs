use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Snapshot of an epoch clock as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    pub identifier: String,
    pub duration: Duration,
    pub current_epoch: i64,
    pub current_epoch_start_time: Timestamp,
}

impl EpochInfo {
    /// Epoch length in whole seconds, at least 1.
    pub fn duration_secs(&self) -> u64 {
        self.duration.as_secs().max(1)
    }

    /// First epoch in which a gauge starting at `start_time` is paid, given
    /// the current time `now`.
    pub fn first_paying_epoch(&self, start_time: Timestamp, now: Timestamp) -> i64 {
        if start_time <= now {
            return self.current_epoch;
        }
        let ahead = (start_time - now) as u64 / self.duration_secs();
        self.current_epoch + 1 + ahead as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_gauges_start_paying_in_a_later_epoch() {
        let info = EpochInfo {
            identifier: "day".into(),
            duration: Duration::from_secs(100),
            current_epoch: 5,
            current_epoch_start_time: 0,
        };
        assert_eq!(info.first_paying_epoch(10, 50), 5);
        assert_eq!(info.first_paying_epoch(120, 50), 6);
        assert_eq!(info.first_paying_epoch(400, 50), 9);
    }
}
