use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::info;

use super::catalog::Registry;
use crate::error::{RegistryError, ServeError};

/// Holds the process registry: empty until startup installs it, then fixed.
///
/// Readers never block; before installation they get `ServiceUnavailable`
/// immediately.
#[derive(Default)]
pub struct RegistrySlot {
    inner: ArcSwapOption<Registry>,
}

impl RegistrySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(registry: Registry) -> Self {
        Self {
            inner: ArcSwapOption::from_pointee(registry),
        }
    }

    /// The single `UNINITIALIZED -> LOADED` transition.
    pub fn install(&self, registry: Registry) -> Result<Arc<Registry>, RegistryError> {
        let registry = Arc::new(registry);
        let previous = self
            .inner
            .rcu(|current| current.clone().or_else(|| Some(registry.clone())));

        match previous {
            Some(_) => Err(RegistryError::AlreadyLoaded),
            None => {
                info!("Registry installed with {} models", registry.total_models());
                Ok(registry)
            }
        }
    }

    pub fn get(&self) -> Result<Arc<Registry>, ServeError> {
        self.inner.load_full().ok_or(ServeError::ServiceUnavailable)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.load().is_some()
    }
}
