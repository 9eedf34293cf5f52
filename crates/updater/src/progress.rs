//! Throughput and remaining-time estimation for update downloads.
//!
//! The estimator is stateless: each call gets the cumulative byte counts and
//! the milliseconds elapsed since the previous sample, which the caller keeps.

use std::fmt;

use serde::{Deserialize, Serialize};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// One progress notification from a running download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub delta_time_ms: u64,
}

impl ProgressSample {
    /// A zero `total_bytes` marks a download of unknown size; such a sample
    /// never reports completion.
    pub fn estimate(&self) -> TransferEstimate {
        let mut estimate = estimate(self.transferred_bytes, self.total_bytes, self.delta_time_ms);
        if self.size_unknown() {
            estimate.eta = Eta::Unknown;
        }
        estimate
    }

    pub fn size_unknown(&self) -> bool {
        self.total_bytes == 0 && self.transferred_bytes > 0
    }
}

/// Remaining time broken down by floor division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingTime {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl RemainingTime {
    pub fn from_seconds(total: f64) -> Self {
        let total = if total.is_finite() && total > 0.0 { total } else { 0.0 };
        Self {
            hours: (total / 3600.0).floor() as u64,
            minutes: ((total % 3600.0) / 60.0).floor() as u64,
            seconds: (total % 60.0).floor() as u64,
        }
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Eta {
    Remaining { seconds: f64, breakdown: RemainingTime },
    /// Bytes remain but no throughput has been observed yet.
    Unknown,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferEstimate {
    pub speed_mbps: f64,
    pub eta: Eta,
}

impl TransferEstimate {
    /// Log line for the measured speed.
    pub fn speed_line(&self) -> String {
        format!("download speed: {:.2} MB/s", self.speed_mbps)
    }

    /// Log line for the remaining time.
    pub fn eta_line(&self) -> String {
        match self.eta {
            Eta::Remaining { breakdown, .. } => format!("estimated time remaining: {breakdown}"),
            Eta::Unknown => "estimated time remaining: computing...".to_string(),
            Eta::Complete => "download complete".to_string(),
        }
    }
}

/// Compute instantaneous throughput and a remaining-time estimate.
pub fn estimate(transferred: u64, total: u64, delta_time_ms: u64) -> TransferEstimate {
    let raw_speed = if transferred > 0 && delta_time_ms > 0 {
        (transferred as f64 / delta_time_ms as f64) * (1000.0 / BYTES_PER_MEGABYTE)
    } else {
        0.0
    };
    let speed_mbps = if raw_speed.is_finite() && raw_speed > 0.0 {
        raw_speed
    } else {
        0.0
    };

    let eta = if transferred >= total {
        Eta::Complete
    } else if speed_mbps > 0.0 {
        let remaining = (total - transferred) as f64;
        let seconds = remaining / (speed_mbps * BYTES_PER_MEGABYTE / 8.0);
        Eta::Remaining {
            seconds,
            breakdown: RemainingTime::from_seconds(seconds),
        }
    } else {
        Eta::Unknown
    };

    TransferEstimate { speed_mbps, eta }
}
