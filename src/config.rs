//! Configuration management for Queuegate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{QueueGateError, Result};
use crate::ratelimit::{
    FixedWindow, LeakyBucket, SlidingWindow, TimeWindow, TokenBucket, DEFAULT_BUCKET_CAPACITY,
    DEFAULT_FIXED_LIMIT, DEFAULT_FIXED_UNIT, DEFAULT_LEAK_RATE, DEFAULT_SLIDING_LIMIT,
    DEFAULT_TOKEN_CAPACITY, DEFAULT_TOKEN_RATE, DEFAULT_WINDOW_SECS,
};

/// Prefix for environment variable overrides, e.g.
/// `QUEUEGATE__LIMITS__TOKEN_BUCKET__CAPACITY=10`.
pub const ENV_PREFIX: &str = "QUEUEGATE";

/// Main configuration for the Queuegate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueGateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Limiter tunables
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Idle client state eviction
    #[serde(default)]
    pub eviction: EvictionConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

/// Tunables for every limiter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default)]
    pub fixed_window: FixedWindowConfig,

    #[serde(default)]
    pub sliding_window: SlidingWindowConfig,

    #[serde(default)]
    pub leaky_bucket: LeakyBucketConfig,

    #[serde(default)]
    pub token_bucket: TokenBucketConfig,
}

/// Fixed window limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedWindowConfig {
    /// Number of requests allowed per unit of time
    #[serde(default = "default_fixed_limit")]
    pub requests_per_unit: u64,

    /// The time unit
    #[serde(default = "default_fixed_unit")]
    pub unit: TimeWindow,
}

impl Default for FixedWindowConfig {
    fn default() -> Self {
        Self {
            requests_per_unit: default_fixed_limit(),
            unit: default_fixed_unit(),
        }
    }
}

fn default_fixed_limit() -> u64 {
    DEFAULT_FIXED_LIMIT
}

fn default_fixed_unit() -> TimeWindow {
    DEFAULT_FIXED_UNIT
}

/// Sliding window limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidingWindowConfig {
    /// Trailing window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Admissions allowed per window
    #[serde(default = "default_sliding_limit")]
    pub limit: usize,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            limit: default_sliding_limit(),
        }
    }
}

fn default_window_secs() -> f64 {
    DEFAULT_WINDOW_SECS
}

fn default_sliding_limit() -> usize {
    DEFAULT_SLIDING_LIMIT
}

/// Leaky bucket limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakyBucketConfig {
    /// Bucket capacity in units
    #[serde(default = "default_bucket_capacity")]
    pub capacity: f64,

    /// Units drained per second
    #[serde(default = "default_leak_rate")]
    pub leak_rate: f64,
}

impl Default for LeakyBucketConfig {
    fn default() -> Self {
        Self {
            capacity: default_bucket_capacity(),
            leak_rate: default_leak_rate(),
        }
    }
}

fn default_bucket_capacity() -> f64 {
    DEFAULT_BUCKET_CAPACITY
}

fn default_leak_rate() -> f64 {
    DEFAULT_LEAK_RATE
}

/// Token bucket limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    /// Maximum tokens held
    #[serde(default = "default_token_capacity")]
    pub capacity: f64,

    /// Tokens added per second
    #[serde(default = "default_token_rate")]
    pub refill_rate: f64,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            capacity: default_token_capacity(),
            refill_rate: default_token_rate(),
        }
    }
}

fn default_token_capacity() -> f64 {
    DEFAULT_TOKEN_CAPACITY
}

fn default_token_rate() -> f64 {
    DEFAULT_TOKEN_RATE
}

/// Eviction of client state that has gone idle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Seconds without a request before a client's limiter state is dropped
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: f64,

    /// Seconds between eviction sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl EvictionConfig {
    /// Interval between sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_idle_ttl() -> f64 {
    10.0 * DEFAULT_WINDOW_SECS
}

fn default_sweep_interval() -> u64 {
    60
}

impl LimitsConfig {
    /// Build the fixed window policy.
    pub fn fixed_window(&self) -> Result<FixedWindow> {
        FixedWindow::new(self.fixed_window.requests_per_unit, self.fixed_window.unit)
    }

    /// Build the sliding window policy.
    pub fn sliding_window(&self) -> Result<SlidingWindow> {
        SlidingWindow::new(self.sliding_window.window_secs, self.sliding_window.limit)
    }

    /// Build the leaky bucket policy.
    pub fn leaky_bucket(&self) -> Result<LeakyBucket> {
        LeakyBucket::new(self.leaky_bucket.capacity, self.leaky_bucket.leak_rate)
    }

    /// Build the token bucket policy.
    pub fn token_bucket(&self) -> Result<TokenBucket> {
        TokenBucket::new(self.token_bucket.capacity, self.token_bucket.refill_rate)
    }
}

fn env_overrides(source: Option<HashMap<String, String>>) -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .source(source)
}

impl QueueGateConfig {
    /// Load configuration from a file, applying `QUEUEGATE__*` environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with_env(path, None)
    }

    /// Load configuration from a file, taking overrides from `env` instead of
    /// the process environment when it is given.
    fn from_file_with_env<P: AsRef<Path>>(
        path: P,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let config: QueueGateConfig = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(env_overrides(env))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| QueueGateError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: QueueGateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| QueueGateError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every tunable for a usable value.
    pub fn validate(&self) -> Result<()> {
        self.limits.fixed_window()?;
        self.limits.sliding_window()?;
        self.limits.leaky_bucket()?;
        self.limits.token_bucket()?;

        if !self.eviction.idle_ttl_secs.is_finite() || self.eviction.idle_ttl_secs <= 0.0 {
            return Err(QueueGateError::Config(format!(
                "eviction idle_ttl_secs must be positive, got {}",
                self.eviction.idle_ttl_secs
            )));
        }
        if self.eviction.sweep_interval_secs == 0 {
            return Err(QueueGateError::Config(
                "eviction sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
