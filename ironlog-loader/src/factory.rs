use crate::config::{ConfigError, LoaderConfig};
use crate::context::RequestContext;
use crate::principal::Principal;
use ironlog_data::Storage;
use std::sync::Arc;

/// Process-wide builder of request contexts.
///
/// Holds only the storage handle and validated configuration; it carries
/// no cache of its own, so nothing loaded by one request is ever visible to
/// another.
#[derive(Clone)]
pub struct LoaderFactory {
    storage: Arc<dyn Storage>,
    config: LoaderConfig,
}

impl LoaderFactory {
    /// Create a factory over `storage`, rejecting an invalid `config`.
    pub fn new(storage: impl Storage, config: LoaderConfig) -> Result<Self, ConfigError> {
        Self::from_arc(Arc::new(storage), config)
    }

    /// Like [`new`](Self::new), for storage that is already shared.
    pub fn from_arc(storage: Arc<dyn Storage>, config: LoaderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { storage, config })
    }

    /// Fresh context for one inbound request. `None` means the request
    /// carried no principal; every load through it is denied.
    pub fn new_request_context(&self, principal: Option<Principal>) -> RequestContext {
        RequestContext::new(principal, Arc::clone(&self.storage), self.config.clone())
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}
