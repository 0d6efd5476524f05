//! Configuration for the engine and its remote client.

use std::time::Duration;

/// Default remote request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of remote deletes in flight at once.
pub const DEFAULT_MAX_CONCURRENT_DELETES: usize = 8;

/// How the deletion pass treats a remote 404 for a record it is deleting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingRemotePolicy {
    /// The record is already gone remotely; count it as deleted.
    #[default]
    AlreadyDeleted,
    /// Treat 404 like any other failure and retry next cycle.
    ///
    /// Combined with the all-or-nothing deletion pass this can stall: once
    /// one delete of a set has reached the remote and another failed, the
    /// first answers 404 on every later cycle and the set is never purged.
    /// Use it only when the remote never forgets a record on its own.
    Retry,
}

/// Tuning for `SyncEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrent remote deletes in the deletion pass.
    pub max_concurrent_deletes: usize,
    pub missing_on_delete: MissingRemotePolicy,
    /// Also fetch and import the remote's full list at the end of each cycle.
    pub pull_on_cycle: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            max_concurrent_deletes: DEFAULT_MAX_CONCURRENT_DELETES,
            missing_on_delete: MissingRemotePolicy::default(),
            pull_on_cycle: false,
        }
    }

    /// Sets the delete fan-out bound (at least 1).
    pub fn with_max_concurrent_deletes(mut self, limit: usize) -> Self {
        self.max_concurrent_deletes = limit.max(1);
        self
    }

    pub fn with_missing_on_delete(mut self, policy: MissingRemotePolicy) -> Self {
        self.missing_on_delete = policy;
        self
    }

    pub fn with_pull_on_cycle(mut self, enabled: bool) -> Self {
        self.pull_on_cycle = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Where and how to reach the service of record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_deletes, DEFAULT_MAX_CONCURRENT_DELETES);
        assert_eq!(config.missing_on_delete, MissingRemotePolicy::AlreadyDeleted);
        assert!(!config.pull_on_cycle);
    }

    #[test]
    fn delete_bound_is_at_least_one() {
        let config = EngineConfig::new().with_max_concurrent_deletes(0);
        assert_eq!(config.max_concurrent_deletes, 1);
    }

    #[test]
    fn remote_config_builder() {
        let config = RemoteConfig::new("http://localhost:3000").with_timeout(Duration::from_secs(2));
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout, Duration::from_secs(2));
    }
}
