//! Service configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_capacity = 10000
//! ttl_secs = 300
//!
//! [describe]
//! fetch_concurrency = 16
//!
//! [resolve]
//! add_semantics = "multiset"
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::Path;
use std::time::Duration;

use perma_blob::DEFAULT_FETCH_CONCURRENCY;
use perma_describe::ViewCache;
use perma_resolve::{AddSemantics, ResolveOptions};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// View cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether describe serves views from the cache
    pub enabled: bool,
    /// Maximum cached views
    pub max_capacity: u64,
    /// Optional time-to-live in seconds
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 10_000,
            ttl_secs: None,
        }
    }
}

/// Describe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DescribeConfig {
    /// Bound on concurrent blob fetches per batch
    pub fetch_concurrency: usize,
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

/// Resolution settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    /// Treatment of repeated `add-attribute` values
    pub add_semantics: AddSemantics,
}

/// Permanode service configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub cache: CacheConfig,
    pub describe: DescribeConfig,
    pub resolve: ResolveConfig,
}

impl ServiceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for bad TOML or unknown keys,
    /// [`ConfigError::Invalid`] for out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.describe.fetch_concurrency == 0 {
            return Err(ConfigError::invalid("describe.fetch_concurrency must be at least 1"));
        }
        if self.cache.enabled && self.cache.max_capacity == 0 {
            return Err(ConfigError::invalid("cache.max_capacity must be at least 1 when the cache is enabled"));
        }
        if self.cache.ttl_secs == Some(0) {
            return Err(ConfigError::invalid("cache.ttl_secs must be positive"));
        }
        Ok(())
    }

    /// With cache switched on or off
    #[inline]
    #[must_use]
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    /// With cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, max_capacity: u64) -> Self {
        self.cache.max_capacity = max_capacity;
        self
    }

    /// With cache time-to-live
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl_secs = Some(ttl.as_secs().max(1));
        self
    }

    /// With describe fetch concurrency
    #[inline]
    #[must_use]
    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.describe.fetch_concurrency = concurrency;
        self
    }

    /// With add semantics
    #[inline]
    #[must_use]
    pub fn with_add_semantics(mut self, semantics: AddSemantics) -> Self {
        self.resolve.add_semantics = semantics;
        self
    }

    /// Resolve options implied by this configuration
    #[must_use]
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::default().with_add_semantics(self.resolve.add_semantics)
    }

    /// Build the view cache, or `None` when disabled
    #[must_use]
    pub fn build_cache(&self) -> Option<ViewCache> {
        if !self.cache.enabled {
            return None;
        }
        Some(match self.cache.ttl_secs {
            Some(secs) => ViewCache::with_ttl(self.cache.max_capacity, Duration::from_secs(secs)),
            None => ViewCache::new(self.cache.max_capacity),
        })
    }
}
