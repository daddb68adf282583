use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a client `Range` header is treated.
///
/// `Forward` proxies the range upstream and answers 206. `Ignore` always
/// serves the full body with 200, sidestepping partial-content edge cases
/// when the upstream length is unreliable.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RangePolicy {
    #[default]
    Forward,
    Ignore,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    #[serde(default)]
    pub range_policy: RangePolicy,
    #[serde(default = "default_manifest_timeout_secs")]
    pub manifest_timeout_secs: u64,
    #[serde(default = "default_manifest_retries")]
    pub manifest_retries: u32,
    /// TTL for cached manifests in seconds; 0 disables caching.
    #[serde(default)]
    pub manifest_cache_secs: u64,
}

fn default_manifest_timeout_secs() -> u64 {
    10
}

fn default_manifest_retries() -> u32 {
    1
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            range_policy: RangePolicy::default(),
            manifest_timeout_secs: default_manifest_timeout_secs(),
            manifest_retries: default_manifest_retries(),
            manifest_cache_secs: 0,
        }
    }
}

impl RelayConfig {
    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    pub fn manifest_cache_ttl(&self) -> Option<Duration> {
        (self.manifest_cache_secs > 0).then(|| Duration::from_secs(self.manifest_cache_secs))
    }
}
