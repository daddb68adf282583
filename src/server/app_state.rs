use std::sync::Arc;

use crate::common::types::AnyResult;
use crate::configs::Config;
use crate::extractor::{self, ExtractionBackend};
use crate::relay::resolver::ManifestCache;

/// Top-level application state, shared across requests.
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn ExtractionBackend>,
    pub manifest_cache: ManifestCache,
}

impl AppState {
    pub fn from_config(config: Config) -> AnyResult<Self> {
        let backend = extractor::backend_from_config(&config.youtube)?;
        tracing::info!("Loaded extraction backend: {}", backend.name());
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: Config, backend: Arc<dyn ExtractionBackend>) -> Self {
        let manifest_cache = ManifestCache::new(config.relay.manifest_cache_ttl());
        Self {
            config,
            backend,
            manifest_cache,
        }
    }
}
