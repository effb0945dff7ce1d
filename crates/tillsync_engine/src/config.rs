//! Engine configuration.

use crate::scheduler::BackoffConfig;
use std::collections::BTreeMap;
use std::time::Duration;
use tillsync_core::EntityKind;

/// Allowed range for `batch_size`.
pub const BATCH_SIZE_RANGE: (u32, u32) = (10, 200);
/// Allowed range for the remote timeout, in seconds.
pub const TIMEOUT_SECS_RANGE: (u32, u32) = (30, 180);
/// Allowed range for `max_retries`.
pub const MAX_RETRIES_RANGE: (u32, u32) = (1, 10);

/// How often scheduled drains run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSyncInterval {
    /// No scheduled drains; manual drains only.
    Disabled,
    /// Every five minutes.
    FiveMinutes,
    /// Every fifteen minutes.
    FifteenMinutes,
    /// Every thirty minutes.
    ThirtyMinutes,
    /// Every hour.
    OneHour,
}

impl AutoSyncInterval {
    /// Returns the interval as a duration, or `None` when disabled.
    #[must_use]
    pub fn duration(self) -> Option<Duration> {
        match self {
            AutoSyncInterval::Disabled => None,
            AutoSyncInterval::FiveMinutes => Some(Duration::from_secs(5 * 60)),
            AutoSyncInterval::FifteenMinutes => Some(Duration::from_secs(15 * 60)),
            AutoSyncInterval::ThirtyMinutes => Some(Duration::from_secs(30 * 60)),
            AutoSyncInterval::OneHour => Some(Duration::from_secs(60 * 60)),
        }
    }
}

/// Configuration for the sync engine.
///
/// Numeric options are clamped to their allowed ranges by the
/// builders, so a config assembled from untrusted settings is always
/// usable.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Scheduled drain cadence.
    pub auto_sync_interval: AutoSyncInterval,
    /// Maximum queue items processed per drain.
    pub batch_size: u32,
    /// Remote request timeout, consumed by transport implementations.
    pub timeout: Duration,
    /// Ask the transport to compress request bodies.
    pub compress: bool,
    /// Force-retry failed items at the start of every drain.
    pub retry_failed_automatically: bool,
    /// Emit a warning-level notification when a drain ends in error.
    pub notify_on_error: bool,
    /// Retry ceiling for queue items.
    pub max_retries: u32,
    /// Backoff between failed scheduled passes.
    pub backoff: BackoffConfig,
    per_kind_enabled: BTreeMap<EntityKind, bool>,
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            auto_sync_interval: AutoSyncInterval::FifteenMinutes,
            batch_size: 50,
            timeout: Duration::from_secs(30),
            compress: false,
            retry_failed_automatically: false,
            notify_on_error: true,
            max_retries: 5,
            backoff: BackoffConfig::default(),
            per_kind_enabled: BTreeMap::new(),
        }
    }

    /// Sets the scheduled drain cadence.
    #[must_use]
    pub fn with_auto_sync_interval(mut self, interval: AutoSyncInterval) -> Self {
        self.auto_sync_interval = interval;
        self
    }

    /// Sets the batch size, clamped to its allowed range.
    #[must_use]
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size.clamp(BATCH_SIZE_RANGE.0, BATCH_SIZE_RANGE.1);
        self
    }

    /// Sets the remote timeout in seconds, clamped to its allowed range.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u32) -> Self {
        let secs = secs.clamp(TIMEOUT_SECS_RANGE.0, TIMEOUT_SECS_RANGE.1);
        self.timeout = Duration::from_secs(u64::from(secs));
        self
    }

    /// Sets request compression.
    #[must_use]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Sets automatic force-retry of failed items.
    #[must_use]
    pub fn with_retry_failed_automatically(mut self, retry: bool) -> Self {
        self.retry_failed_automatically = retry;
        self
    }

    /// Sets error notifications.
    #[must_use]
    pub fn with_notify_on_error(mut self, notify: bool) -> Self {
        self.notify_on_error = notify;
        self
    }

    /// Sets the retry ceiling, clamped to its allowed range.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.clamp(MAX_RETRIES_RANGE.0, MAX_RETRIES_RANGE.1);
        self
    }

    /// Sets the backoff policy for failed scheduled passes.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enables or disables sync for one entity kind.
    #[must_use]
    pub fn with_kind_enabled(mut self, kind: EntityKind, enabled: bool) -> Self {
        self.per_kind_enabled.insert(kind, enabled);
        self
    }

    /// Returns whether sync is enabled for a kind. Kinds are enabled
    /// unless explicitly disabled.
    #[must_use]
    pub fn kind_enabled(&self, kind: EntityKind) -> bool {
        self.per_kind_enabled.get(&kind).copied().unwrap_or(true)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
