//! Proxy resolution and process-wide routing defaults.

use std::sync::RwLock;

use crate::error::Result;
use crate::proxy::{LocatorPrx, ObjectPrx, RouterPrx};

/// Converts between proxies and their string form.
#[derive(Debug, Default)]
pub struct ProxyFactory;

impl ProxyFactory {
    pub fn new() -> Self {
        Self
    }

    /// Parse a stringified proxy. A blank string is the null proxy.
    pub fn string_to_proxy(&self, s: &str) -> Result<Option<ObjectPrx>> {
        if s.trim().is_empty() {
            return Ok(None);
        }
        s.parse().map(Some)
    }

    /// Stringify a proxy. The null proxy stringifies to `""`.
    pub fn proxy_to_string(&self, proxy: Option<&ObjectPrx>) -> String {
        proxy.map(ToString::to_string).unwrap_or_default()
    }
}

/// Holds the default router and locator applied to new references and
/// adapters.
///
/// Synchronizes itself: the communicator deliberately calls the setters
/// without its own lock, including while it is being destroyed.
#[derive(Debug, Default)]
pub struct ReferenceFactory {
    default_router: RwLock<Option<RouterPrx>>,
    default_locator: RwLock<Option<LocatorPrx>>,
}

impl ReferenceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_router(&self) -> Option<RouterPrx> {
        self.default_router
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_default_router(&self, router: Option<RouterPrx>) {
        *self
            .default_router
            .write()
            .unwrap_or_else(|e| e.into_inner()) = router;
    }

    pub fn default_locator(&self) -> Option<LocatorPrx> {
        self.default_locator
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_default_locator(&self, locator: Option<LocatorPrx>) {
        *self
            .default_locator
            .write()
            .unwrap_or_else(|e| e.into_inner()) = locator;
    }

    /// Drop both defaults.
    pub(crate) fn clear(&self) {
        self.set_default_router(None);
        self.set_default_locator(None);
    }
}
