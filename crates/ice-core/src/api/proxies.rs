//! Proxy resolution and routing defaults on Communicator.

use crate::error::Result;
use crate::proxy::{LocatorPrx, ObjectPrx, RouterPrx};
use crate::Communicator;

impl Communicator {
    // ========================================
    // Proxies
    // ========================================

    /// Parse a stringified proxy. A blank string is the null proxy (`None`).
    pub fn string_to_proxy(&self, s: &str) -> Result<Option<ObjectPrx>> {
        let _guard = self.lock_active()?;
        self.instance.proxy_factory().string_to_proxy(s)
    }

    /// Stringify a proxy. The null proxy stringifies to `""`.
    pub fn proxy_to_string(&self, proxy: Option<&ObjectPrx>) -> Result<String> {
        let _guard = self.lock_active()?;
        Ok(self.instance.proxy_factory().proxy_to_string(proxy))
    }

    // ========================================
    // Routing Defaults
    // ========================================
    //
    // Not guarded: the reference factory synchronizes itself, and setting a
    // default while the communicator is being torn down is not a use of a
    // destroyed resource.

    pub fn set_default_router(&self, router: Option<RouterPrx>) {
        self.instance.reference_factory().set_default_router(router);
    }

    pub fn set_default_locator(&self, locator: Option<LocatorPrx>) {
        self.instance.reference_factory().set_default_locator(locator);
    }

    pub fn default_router(&self) -> Result<Option<RouterPrx>> {
        let _guard = self.lock_active()?;
        Ok(self.instance.reference_factory().default_router())
    }

    pub fn default_locator(&self) -> Result<Option<LocatorPrx>> {
        let _guard = self.lock_active()?;
        Ok(self.instance.reference_factory().default_locator())
    }
}
