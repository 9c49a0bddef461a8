//! Runtime configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

pub const DEFAULT_BASE_URL: &str = "https://efdsearch.senate.gov";
pub const DEFAULT_DB_PATH: &str = "data/ptr_trades.db";
/// Upper bound for any day count taken from the environment.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Store connection retry: `max_attempts` total tries, sleeping
/// `backoff_step * attempt` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_step: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        self.backoff_step.saturating_mul(attempt.min(u32::MAX as usize) as u32)
    }
}

/// Settings for an ingestion or backfill run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub base_url: String,
    pub page_size: usize,
    /// Pause between detail page fetches.
    pub detail_delay: Duration,
    pub price_window_days: i64,
    pub latest_max_age_days: i64,
    pub store_retry: RetryPolicy,
    pub db_path: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 100,
            detail_delay: Duration::from_millis(250),
            price_window_days: 30,
            latest_max_age_days: 5,
            store_retry: RetryPolicy::default(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("EFD_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            page_size: env_usize("PTR_PAGE_SIZE", defaults.page_size).max(1),
            detail_delay: Duration::from_millis(env_u64("PTR_DETAIL_DELAY_MS", 250)),
            price_window_days: env_i64("PTR_PRICE_WINDOW_DAYS", defaults.price_window_days)
                .clamp(1, MAX_LOOKBACK_DAYS),
            latest_max_age_days: env_i64("PTR_LATEST_MAX_AGE_DAYS", defaults.latest_max_age_days)
                .clamp(0, MAX_LOOKBACK_DAYS),
            store_retry: RetryPolicy {
                max_attempts: env_usize("PTR_STORE_RETRY_MAX", 5).max(1),
                backoff_step: Duration::from_millis(env_u64("PTR_STORE_RETRY_STEP_MS", 2000)),
            },
            db_path: std::env::var("PTR_DB")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
        }
    }
}

/// `end - days`, or `None` when the result is not a representable date.
pub fn lookback_start(end: NaiveDate, days: i64) -> Option<NaiveDate> {
    chrono::Duration::try_days(days).and_then(|span| end.checked_sub_signed(span))
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|val| val.parse::<i64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_backoff() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_step: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn defaults() {
        let cfg = IngestConfig::default();
        assert_eq!(cfg.base_url, "https://efdsearch.senate.gov");
        assert_eq!(cfg.page_size, 100);
        assert_eq!(cfg.price_window_days, 30);
        assert_eq!(cfg.store_retry.max_attempts, 5);
        assert_eq!(cfg.db_path, PathBuf::from("data/ptr_trades.db"));
    }

    #[test]
    fn lookback_start_is_checked() {
        let end = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        assert_eq!(lookback_start(end, 90), NaiveDate::from_ymd_opt(2025, 12, 31));
        assert_eq!(lookback_start(end, 0), Some(end));
        assert_eq!(lookback_start(end, 1_000_000_000), None);
        assert_eq!(lookback_start(end, i64::MAX), None);
    }

    #[test]
    fn day_counts_from_env_are_clamped() {
        std::env::set_var("PTR_PRICE_WINDOW_DAYS", "1000000000000");
        std::env::set_var("PTR_LATEST_MAX_AGE_DAYS", "-4");
        let cfg = IngestConfig::from_env();
        std::env::remove_var("PTR_PRICE_WINDOW_DAYS");
        std::env::remove_var("PTR_LATEST_MAX_AGE_DAYS");
        assert_eq!(cfg.price_window_days, MAX_LOOKBACK_DAYS);
        assert_eq!(cfg.latest_max_age_days, 0);
    }

    #[test]
    fn env_parsing_falls_back_on_garbage() {
        std::env::set_var("PTR_TEST_ENV_GARBAGE", "not-a-number");
        assert_eq!(env_u64("PTR_TEST_ENV_GARBAGE", 7), 7);
        std::env::set_var("PTR_TEST_ENV_NUMBER", "42");
        assert_eq!(env_usize("PTR_TEST_ENV_NUMBER", 7), 42);
        assert_eq!(env_i64("PTR_TEST_ENV_UNSET_KEY", -3), -3);
    }
}
