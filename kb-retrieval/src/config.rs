//! Retriever configuration
//!
//! Built in code with [`RetrieverConfig::builder`] or read from the
//! environment (and an optional `.env` file) with [`RetrieverConfig::from_env`].

use crate::cache::CacheConfig;
use crate::error::{Result, RetrievalError};
use crate::retrieval::DEFAULT_TOP_K;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CACHE_TTL_SECS: &str = "KB_CACHE_TTL_SECS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "KB_CACHE_MAX_ENTRIES";
pub const ENV_CACHE_TTL_JITTER: &str = "KB_CACHE_TTL_JITTER";
pub const ENV_INDEX_TIMEOUT_MS: &str = "KB_INDEX_TIMEOUT_MS";
pub const ENV_OVERFETCH_MULTIPLIER: &str = "KB_OVERFETCH_MULTIPLIER";

/// Configuration for [`crate::Retriever`]
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Query result cache settings
    pub cache: CacheConfig,

    /// The index is asked for `top_k * overfetch_multiplier` hits so that
    /// filtering and deduplication still leave enough passages
    pub overfetch_multiplier: usize,

    /// Upper bound on a single index search
    pub index_timeout: Duration,

    /// `top_k` used by [`crate::Retriever::request`]
    pub default_top_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            overfetch_multiplier: 2,
            index_timeout: Duration::from_secs(10),
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

impl RetrieverConfig {
    pub fn builder() -> RetrieverConfigBuilder {
        RetrieverConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;

        if self.overfetch_multiplier == 0 {
            return Err(RetrievalError::ConfigError(
                "overfetch_multiplier must be at least 1".to_string(),
            ));
        }

        if self.index_timeout.is_zero() {
            return Err(RetrievalError::ConfigError(
                "index_timeout must be non-zero".to_string(),
            ));
        }

        if self.default_top_k == 0 {
            return Err(RetrievalError::ConfigError(
                "default_top_k must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Defaults overridden by `KB_*` environment variables
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Unset variables keep their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cache = CacheConfig::builder();
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_CACHE_TTL_SECS)? {
            cache = cache.default_ttl(Duration::from_secs(secs));
        }
        if let Some(max) = parse_var::<usize, _>(&lookup, ENV_CACHE_MAX_ENTRIES)? {
            cache = cache.max_entries(max);
        }
        if let Some(jitter) = parse_var::<f64, _>(&lookup, ENV_CACHE_TTL_JITTER)? {
            cache = cache.ttl_jitter(jitter);
        }

        let mut builder = RetrieverConfig::builder().cache(cache.build());
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_INDEX_TIMEOUT_MS)? {
            builder = builder.index_timeout(Duration::from_millis(ms));
        }
        if let Some(multiplier) = parse_var::<usize, _>(&lookup, ENV_OVERFETCH_MULTIPLIER)? {
            builder = builder.overfetch_multiplier(multiplier);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            RetrievalError::ConfigError(format!("invalid {} value {:?}: {}", name, raw, e))
        }),
    }
}

/// Builder for retriever configuration
#[derive(Debug, Default)]
pub struct RetrieverConfigBuilder {
    cache: Option<CacheConfig>,
    overfetch_multiplier: Option<usize>,
    index_timeout: Option<Duration>,
    default_top_k: Option<usize>,
}

impl RetrieverConfigBuilder {
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn overfetch_multiplier(mut self, multiplier: usize) -> Self {
        self.overfetch_multiplier = Some(multiplier);
        self
    }

    pub fn index_timeout(mut self, timeout: Duration) -> Self {
        self.index_timeout = Some(timeout);
        self
    }

    pub fn default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = Some(top_k);
        self
    }

    pub fn build(self) -> RetrieverConfig {
        let defaults = RetrieverConfig::default();

        RetrieverConfig {
            cache: self.cache.unwrap_or(defaults.cache),
            overfetch_multiplier: self
                .overfetch_multiplier
                .unwrap_or(defaults.overfetch_multiplier),
            index_timeout: self.index_timeout.unwrap_or(defaults.index_timeout),
            default_top_k: self.default_top_k.unwrap_or(defaults.default_top_k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RetrieverConfig::default();
        assert_eq!(config.overfetch_multiplier, 2);
        assert_eq!(config.index_timeout, Duration::from_secs(10));
        assert_eq!(config.default_top_k, 3);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
        assert_eq!(config.cache.max_entries, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let config = RetrieverConfig::builder().overfetch_multiplier(0).build();
        assert!(matches!(config.validate(), Err(RetrievalError::ConfigError(_))));

        let config = RetrieverConfig::builder().index_timeout(Duration::ZERO).build();
        assert!(config.validate().is_err());

        let config = RetrieverConfig::builder()
            .cache(CacheConfig::builder().max_entries(0).build())
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = RetrieverConfig::from_lookup(lookup(&[
            (ENV_CACHE_TTL_SECS, "60"),
            (ENV_CACHE_MAX_ENTRIES, " 50 "),
            (ENV_INDEX_TIMEOUT_MS, "250"),
            (ENV_OVERFETCH_MULTIPLIER, "4"),
        ]))
        .unwrap();

        assert_eq!(config.cache.default_ttl, Duration::from_secs(60));
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.index_timeout, Duration::from_millis(250));
        assert_eq!(config.overfetch_multiplier, 4);
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = RetrieverConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.overfetch_multiplier, 2);
        assert_eq!(config.cache.max_entries, 1000);
    }

    #[test]
    fn test_from_lookup_malformed() {
        let err = RetrieverConfig::from_lookup(lookup(&[(ENV_CACHE_MAX_ENTRIES, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_CACHE_MAX_ENTRIES));

        let err = RetrieverConfig::from_lookup(lookup(&[(ENV_CACHE_TTL_JITTER, "1.5")]))
            .unwrap_err();
        assert!(matches!(err, RetrievalError::ConfigError(_)));
    }
}
