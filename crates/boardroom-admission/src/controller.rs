//! The admission controller: one fixed window per origin.
//!
//! # Concurrency note
//!
//! Unlike the per-session state, the counters here are shared by every
//! connection task, so they live in a `DashMap`. Each origin's window is
//! updated under its shard lock, which makes check-and-increment atomic
//! per origin without a global lock.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use crate::{AdmissionConfig, AdmissionError};

/// A successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Creations this origin has left in the current window.
    pub remaining: u32,
    /// When the current window closes.
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

impl Window {
    fn open(now: DateTime<Utc>) -> Self {
        Self {
            started: now,
            count: 0,
        }
    }
}

/// Rate-limits session creation per origin.
pub struct AdmissionController {
    config: AdmissionConfig,
    window: TimeDelta,
    windows: DashMap<String, Window>,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        let secs = i64::try_from(config.window_secs).unwrap_or(i64::MAX);
        let window = TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX);
        Self {
            config,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Counts one session creation for `origin` against its quota.
    ///
    /// # Errors
    /// Returns [`AdmissionError::RateLimited`] with the reset time if the
    /// origin already used up its quota for the current window.
    pub fn admit(&self, origin: &str) -> Result<Admission, AdmissionError> {
        self.admit_at(origin, Utc::now())
    }

    /// [`admit`](Self::admit) with an explicit clock reading.
    pub fn admit_at(
        &self,
        origin: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission, AdmissionError> {
        let mut window = self
            .windows
            .entry(origin.to_owned())
            .or_insert_with(|| Window::open(now));

        if now >= self.closes_at(window.started) {
            *window = Window::open(now);
        }
        let reset_at = self.closes_at(window.started);

        if window.count >= self.config.max_per_window {
            tracing::warn!(origin, %reset_at, "session creation rate limited");
            return Err(AdmissionError::RateLimited {
                origin: origin.to_owned(),
                reset_at,
            });
        }

        window.count += 1;
        Ok(Admission {
            remaining: self.config.max_per_window - window.count,
            reset_at,
        })
    }

    /// Drops windows that have already closed. Returns how many went.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now < self.closes_at(window.started));
        before - self.windows.len()
    }

    /// Number of origins currently tracked.
    pub fn tracked_origins(&self) -> usize {
        self.windows.len()
    }

    fn closes_at(&self, started: DateTime<Utc>) -> DateTime<Utc> {
        started
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(AdmissionConfig::default())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Time is passed in explicitly through `admit_at`, so window expiry
    //! is tested without sleeping.

    use super::*;

    fn controller(max: u32, window_secs: u64) -> AdmissionController {
        AdmissionController::new(AdmissionConfig {
            max_per_window: max,
            window_secs,
        })
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_admit_under_limit_counts_down() {
        let ac = controller(3, 60);
        let first = ac.admit_at("10.0.0.1", t0()).unwrap();
        assert_eq!(first.remaining, 2);
        let second = ac.admit_at("10.0.0.1", t0()).unwrap();
        assert_eq!(second.remaining, 1);
        assert_eq!(second.reset_at, t0() + TimeDelta::seconds(60));
    }

    #[test]
    fn test_admit_over_limit_returns_reset_at() {
        let ac = controller(2, 60);
        let now = t0() + TimeDelta::seconds(10);
        ac.admit_at("10.0.0.1", t0()).unwrap();
        ac.admit_at("10.0.0.1", t0()).unwrap();

        let err = ac.admit_at("10.0.0.1", now).unwrap_err();
        let AdmissionError::RateLimited { origin, reset_at } = err;
        assert_eq!(origin, "10.0.0.1");
        assert_eq!(reset_at, t0() + TimeDelta::seconds(60));
        assert!(reset_at >= now);
    }

    #[test]
    fn test_admit_origins_are_independent() {
        let ac = controller(1, 60);
        ac.admit_at("a", t0()).unwrap();
        assert!(ac.admit_at("a", t0()).is_err());
        assert!(ac.admit_at("b", t0()).is_ok());
    }

    #[test]
    fn test_admit_after_window_resets_quota() {
        let ac = controller(1, 60);
        ac.admit_at("a", t0()).unwrap();
        assert!(ac.admit_at("a", t0() + TimeDelta::seconds(59)).is_err());

        let later = t0() + TimeDelta::seconds(60);
        let admission = ac.admit_at("a", later).unwrap();
        assert_eq!(admission.reset_at, later + TimeDelta::seconds(60));
    }

    #[test]
    fn test_admit_zero_quota_refuses_everything() {
        let ac = controller(0, 60);
        assert!(ac.admit_at("a", t0()).is_err());
    }

    #[test]
    fn test_rejection_does_not_extend_window() {
        let ac = controller(1, 60);
        ac.admit_at("a", t0()).unwrap();
        for offset in [10, 20, 30] {
            let err = ac.admit_at("a", t0() + TimeDelta::seconds(offset));
            assert!(err.is_err());
        }
        assert!(ac.admit_at("a", t0() + TimeDelta::seconds(60)).is_ok());
    }

    #[test]
    fn test_prune_drops_closed_windows_only() {
        let ac = controller(5, 60);
        ac.admit_at("old", t0()).unwrap();
        ac.admit_at("new", t0() + TimeDelta::seconds(30)).unwrap();

        let removed = ac.prune(t0() + TimeDelta::seconds(61));
        assert_eq!(removed, 1);
        assert_eq!(ac.tracked_origins(), 1);
    }

    #[test]
    fn test_huge_window_does_not_overflow() {
        let ac = controller(1, u64::MAX);
        ac.admit_at("a", t0()).unwrap();
        let AdmissionError::RateLimited { reset_at, .. } =
            ac.admit_at("a", t0()).unwrap_err();
        assert!(reset_at > t0());
    }
}
