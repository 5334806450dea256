//! Object adapter creation on Communicator.

use std::sync::Arc;

use crate::adapter::ObjectAdapter;
use crate::config::PropertyNames;
use crate::error::Result;
use crate::proxy::{LocatorPrx, RouterPrx};
use crate::Communicator;

/// Where a named adapter gets its routing from.
enum AdapterRouting {
    Router(Option<RouterPrx>),
    Locator(Option<LocatorPrx>),
    DefaultLocator,
}

impl Communicator {
    // ========================================
    // Object Adapters
    // ========================================

    /// Create an object adapter.
    ///
    /// An empty `name` creates an anonymous adapter with no endpoints and no
    /// adapter id, whatever the properties say. Otherwise the adapter is
    /// configured from `<name>.AdapterId` and `<name>.Endpoints`, and gets
    /// `Ice.Adapter.<name>.Router` as its router if set, else
    /// `Ice.Adapter.<name>.Locator` as its locator if set, else the default
    /// locator.
    ///
    /// The first successful call also caches the server worker pool handle
    /// used by [`shutdown`](Self::shutdown). If the pool cannot be created the
    /// new adapter is removed again and the error is returned.
    pub fn create_object_adapter(&self, name: &str) -> Result<Arc<ObjectAdapter>> {
        let _guard = self.lock_active()?;
        self.create_object_adapter_locked(name)
    }

    /// Set `<name>.Endpoints` to `endpoints`, then create the adapter as
    /// [`create_object_adapter`](Self::create_object_adapter) does.
    pub fn create_object_adapter_with_endpoints(
        &self,
        name: &str,
        endpoints: &str,
    ) -> Result<Arc<ObjectAdapter>> {
        let _guard = self.lock_active()?;
        self.instance
            .properties()
            .set_property(&PropertyNames::endpoints(name), endpoints);
        self.create_object_adapter_locked(name)
    }

    fn create_object_adapter_locked(&self, name: &str) -> Result<Arc<ObjectAdapter>> {
        let factory = self.instance.adapter_factory();

        let adapter = if name.is_empty() {
            factory.create_object_adapter("", "", "")?
        } else {
            let properties = self.instance.properties();
            let adapter_id = properties.get_property(&PropertyNames::adapter_id(name));
            let endpoints = properties.get_property(&PropertyNames::endpoints(name));

            // Resolve routing before the adapter exists so a bad proxy
            // string does not leave a half-configured adapter registered.
            let routing = self.adapter_routing(name)?;

            let adapter = factory.create_object_adapter(name, &endpoints, &adapter_id)?;
            match routing {
                AdapterRouting::Router(router) => {
                    if let Some(router) = router {
                        adapter.add_router(router);
                    }
                }
                AdapterRouting::Locator(locator) => adapter.set_locator(locator),
                AdapterRouting::DefaultLocator => {
                    adapter.set_locator(self.instance.reference_factory().default_locator())
                }
            }
            adapter
        };

        if let Err(e) = self.init_server_thread_pool() {
            factory.remove_object_adapter(&adapter);
            return Err(e);
        }
        Ok(adapter)
    }

    fn adapter_routing(&self, name: &str) -> Result<AdapterRouting> {
        let properties = self.instance.properties();
        let resolver = self.instance.proxy_factory();

        let router = properties.get_property(&PropertyNames::adapter_router(name));
        if !router.trim().is_empty() {
            let proxy = resolver.string_to_proxy(&router)?;
            return Ok(AdapterRouting::Router(proxy.map(RouterPrx::unchecked_cast)));
        }

        let locator = properties.get_property(&PropertyNames::adapter_locator(name));
        if !locator.trim().is_empty() {
            let proxy = resolver.string_to_proxy(&locator)?;
            return Ok(AdapterRouting::Locator(proxy.map(LocatorPrx::unchecked_cast)));
        }

        Ok(AdapterRouting::DefaultLocator)
    }
}
