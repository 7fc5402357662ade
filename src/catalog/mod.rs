//! Backend catalog subsystem.
//!
//! # Data Flow
//! ```text
//! [[backends]] in config
//!     → descriptor.rs (immutable BackendDescriptor)
//!     → invoker.rs (adapter picked by provider kind)
//!     → BackendCatalog (ordered, read-only, shared via Arc)
//!     → routing scorer reads descriptors, executor calls invokers
//! ```
//!
//! # Design Decisions
//! - Catalog order is significant: it breaks scoring ties
//! - The catalog never filters; consumers apply region/budget constraints
//! - Reload builds a new catalog and swaps it whole

pub mod descriptor;
pub mod invoker;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendConfig, TimeoutConfig};

pub use descriptor::{BackendDescriptor, ProviderKind, QualityTier, Region};
pub use invoker::{
    BackendInvoker, BackendReply, ByteStream, Completion, InvocationError, TokenUsage,
};

/// A descriptor together with the capability used to call it.
#[derive(Clone)]
pub struct CatalogEntry {
    pub descriptor: BackendDescriptor,
    pub invoker: Arc<dyn BackendInvoker>,
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Ordered set of backends the gateway can route to.
#[derive(Debug, Clone, Default)]
pub struct BackendCatalog {
    entries: Vec<CatalogEntry>,
}

impl BackendCatalog {
    /// Create a catalog from prepared entries (catalog order is preserved).
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Build the catalog from validated configuration.
    pub fn from_config(
        configs: &[BackendConfig],
        timeouts: &TimeoutConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()?;
        let call_timeout = Duration::from_secs(timeouts.backend_secs);

        let entries = configs
            .iter()
            .map(|config| {
                let descriptor = BackendDescriptor::from(config);
                let invoker = invoker::adapter_for(
                    &descriptor,
                    config.api_key_env.as_deref(),
                    client.clone(),
                    call_timeout,
                );
                tracing::debug!(
                    backend = %descriptor.name,
                    provider = ?descriptor.provider,
                    model = %descriptor.model,
                    "Catalog entry loaded"
                );
                CatalogEntry { descriptor, invoker }
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.descriptor.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
