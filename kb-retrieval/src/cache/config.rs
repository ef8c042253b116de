//! Configuration for the cache system

use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the query cache
///
/// Knowledge collections can be rebuilt at any time, so the default TTL is
/// minutes rather than hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live applied to every processed result set
    pub default_ttl: Duration,

    /// Maximum number of entries in the cache (hard bound)
    pub max_entries: usize,

    /// TTL jitter factor (0.0 - 1.0)
    /// Spreads expiry of entries populated together; 0.0 disables it
    pub ttl_jitter: f64,

    /// Run a periodic sweep of expired entries in the background
    pub enable_auto_cleanup: bool,

    /// Interval for the background sweep
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // 5 minutes
            default_ttl: Duration::from_secs(300),
            max_entries: 1_000,
            ttl_jitter: 0.0,
            enable_auto_cleanup: false,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(RetrievalError::ConfigError(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(RetrievalError::ConfigError(
                "ttl_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.enable_auto_cleanup && self.cleanup_interval.is_zero() {
            return Err(RetrievalError::ConfigError(
                "cleanup_interval must be non-zero when auto cleanup is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Calculate actual TTL with jitter applied
    ///
    /// A zero `default_ttl` stays zero: such entries expire on their next read.
    pub fn ttl_with_jitter(&self) -> Duration {
        if self.ttl_jitter == 0.0 || self.default_ttl.is_zero() {
            return self.default_ttl;
        }

        let base_secs = self.default_ttl.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(0.001);

        Duration::from_secs_f64(final_secs)
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    default_ttl: Option<Duration>,
    max_entries: Option<usize>,
    ttl_jitter: Option<f64>,
    enable_auto_cleanup: Option<bool>,
    cleanup_interval: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Set default TTL for cache entries
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Enable or disable the background sweep
    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.enable_auto_cleanup = Some(enable);
        self
    }

    /// Set cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            enable_auto_cleanup: self
                .enable_auto_cleanup
                .unwrap_or(defaults.enable_auto_cleanup),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
        }
    }
}

/// Preset configurations for common deployments
impl CacheConfig {
    /// Collections that are rebuilt often (short TTL)
    pub fn realtime() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            max_entries: 500,
            ttl_jitter: 0.1,
            ..Default::default()
        }
    }

    /// Memory-constrained environments
    pub fn small() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_entries: 100,
            ..Default::default()
        }
    }

    /// Many collections and a busy chat front end
    pub fn large() -> Self {
        Self {
            default_ttl: Duration::from_secs(900),
            max_entries: 50_000,
            ttl_jitter: 0.1,
            enable_auto_cleanup: true,
            cleanup_interval: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.max_entries, 1_000);
        assert!(!config.enable_auto_cleanup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut invalid_config = CacheConfig::default();
        invalid_config.max_entries = 0;
        assert!(matches!(
            invalid_config.validate(),
            Err(RetrievalError::ConfigError(_))
        ));

        let mut invalid_config = CacheConfig::default();
        invalid_config.ttl_jitter = 1.5;
        assert!(invalid_config.validate().is_err());

        let invalid_config = CacheConfig::builder()
            .enable_auto_cleanup(true)
            .cleanup_interval(Duration::ZERO)
            .build();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .default_ttl(Duration::from_secs(600))
            .max_entries(5000)
            .ttl_jitter(0.05)
            .build();

        assert_eq!(config.default_ttl, Duration::from_secs(600));
        assert_eq!(config.max_entries, 5000);
        assert_eq!(config.ttl_jitter, 0.05);
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_ttl_with_jitter() {
        let config = CacheConfig {
            default_ttl: Duration::from_secs(300),
            ttl_jitter: 0.1,
            ..Default::default()
        };

        for _ in 0..20 {
            let ttl = config.ttl_with_jitter().as_secs_f64();
            assert!(ttl >= 270.0 - 1e-9);
            assert!(ttl <= 330.0 + 1e-9);
        }
    }

    #[test]
    fn test_zero_ttl_is_not_jittered() {
        let config = CacheConfig {
            default_ttl: Duration::ZERO,
            ttl_jitter: 0.5,
            ..Default::default()
        };
        assert_eq!(config.ttl_with_jitter(), Duration::ZERO);
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(CacheConfig::realtime().default_ttl, Duration::from_secs(60));
        assert_eq!(CacheConfig::small().max_entries, 100);
        assert!(CacheConfig::large().enable_auto_cleanup);

        for preset in [CacheConfig::realtime(), CacheConfig::small(), CacheConfig::large()] {
            assert!(preset.validate().is_ok());
        }
    }
}
