//! Rate limiter configuration.

use std::time::Duration;

/// Default time an acquisition may block before it is denied.
pub const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_millis(5000);
/// Default length of one refresh window.
pub const DEFAULT_LIMIT_REFRESH_PERIOD: Duration = Duration::from_millis(500);
/// Default number of permits granted per window.
pub const DEFAULT_LIMIT_FOR_PERIOD: u32 = 50;

/// Validated, immutable configuration for a [`crate::FixedWindowLimiter`].
///
/// A limiter's active configuration can be swapped (see
/// [`crate::FixedWindowLimiter::change_timeout_duration`] and
/// [`crate::FixedWindowLimiter::change_limit_for_period`]), but a config value
/// itself is never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    timeout_duration: Duration,
    limit_refresh_period: Duration,
    limit_for_period: u32,
}

/// Errors produced when validating limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The refresh period must be non-zero; period arithmetic divides by it.
    #[error("limit_refresh_period must be non-zero")]
    ZeroRefreshPeriod,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            timeout_duration: DEFAULT_TIMEOUT_DURATION,
            limit_refresh_period: DEFAULT_LIMIT_REFRESH_PERIOD,
            limit_for_period: DEFAULT_LIMIT_FOR_PERIOD,
        }
    }
}

impl RateLimiterConfig {
    /// Construct a new builder with the documented defaults.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// How long an acquisition may block before it is denied.
    pub fn timeout_duration(&self) -> Duration {
        self.timeout_duration
    }

    /// Length of one refresh window. Stored with nanosecond resolution.
    pub fn limit_refresh_period(&self) -> Duration {
        self.limit_refresh_period
    }

    /// Number of permits granted per window.
    pub fn limit_for_period(&self) -> u32 {
        self.limit_for_period
    }

    /// Copy of this config with a different timeout.
    pub fn with_timeout_duration(&self, timeout_duration: Duration) -> Self {
        Self { timeout_duration, ..self.clone() }
    }

    /// Copy of this config with a different per-window permit count.
    pub fn with_limit_for_period(&self, limit_for_period: u32) -> Self {
        Self { limit_for_period, ..self.clone() }
    }
}

/// Builder for [`RateLimiterConfig`].
#[derive(Debug, Clone)]
pub struct RateLimiterConfigBuilder {
    timeout_duration: Duration,
    limit_refresh_period: Duration,
    limit_for_period: u32,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Create a builder with the documented defaults.
    pub fn new() -> Self {
        Self {
            timeout_duration: DEFAULT_TIMEOUT_DURATION,
            limit_refresh_period: DEFAULT_LIMIT_REFRESH_PERIOD,
            limit_for_period: DEFAULT_LIMIT_FOR_PERIOD,
        }
    }

    /// Set how long an acquisition may block before it is denied.
    ///
    /// A zero timeout makes insufficient capacity fail immediately.
    pub fn timeout_duration(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    /// Set the length of one refresh window. Must be non-zero.
    pub fn limit_refresh_period(mut self, period: Duration) -> Self {
        self.limit_refresh_period = period;
        self
    }

    /// Set the number of permits granted per window.
    ///
    /// Zero is accepted and yields a limiter that never grants a permit.
    pub fn limit_for_period(mut self, limit: u32) -> Self {
        self.limit_for_period = limit;
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<RateLimiterConfig, ConfigError> {
        if self.limit_refresh_period.is_zero() {
            return Err(ConfigError::ZeroRefreshPeriod);
        }
        Ok(RateLimiterConfig {
            timeout_duration: self.timeout_duration,
            limit_refresh_period: self.limit_refresh_period,
            limit_for_period: self.limit_for_period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.timeout_duration(), Duration::from_millis(5000));
        assert_eq!(config.limit_refresh_period(), Duration::from_millis(500));
        assert_eq!(config.limit_for_period(), 50);
    }

    #[test]
    fn builder_without_overrides_equals_default() {
        let built = RateLimiterConfig::builder().build().unwrap();
        assert_eq!(built, RateLimiterConfig::default());
    }

    #[test]
    fn builder_round_trips_every_field() {
        let config = RateLimiterConfig::builder()
            .timeout_duration(Duration::from_millis(1))
            .limit_refresh_period(Duration::from_nanos(750))
            .limit_for_period(3)
            .build()
            .unwrap();
        assert_eq!(config.timeout_duration(), Duration::from_millis(1));
        assert_eq!(config.limit_refresh_period(), Duration::from_nanos(750));
        assert_eq!(config.limit_for_period(), 3);
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let config = RateLimiterConfig::builder().limit_for_period(7).build().unwrap();
        assert_eq!(config.limit_for_period(), 7);
        assert_eq!(config.timeout_duration(), DEFAULT_TIMEOUT_DURATION);
        assert_eq!(config.limit_refresh_period(), DEFAULT_LIMIT_REFRESH_PERIOD);
    }

    #[test]
    fn zero_refresh_period_is_rejected() {
        let err = RateLimiterConfig::builder()
            .limit_refresh_period(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroRefreshPeriod);
    }

    #[test]
    fn zero_timeout_and_zero_limit_are_valid() {
        let config = RateLimiterConfig::builder()
            .timeout_duration(Duration::ZERO)
            .limit_for_period(0)
            .build()
            .unwrap();
        assert_eq!(config.timeout_duration(), Duration::ZERO);
        assert_eq!(config.limit_for_period(), 0);
    }

    #[test]
    fn with_methods_copy_rather_than_mutate() {
        let base = RateLimiterConfig::default();
        let changed = base.with_timeout_duration(Duration::from_secs(1)).with_limit_for_period(9);
        assert_eq!(base, RateLimiterConfig::default());
        assert_eq!(changed.timeout_duration(), Duration::from_secs(1));
        assert_eq!(changed.limit_for_period(), 9);
        assert_eq!(changed.limit_refresh_period(), base.limit_refresh_period());
    }
}
