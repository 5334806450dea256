//! Object adapters and the factory that creates them.
//!
//! An adapter is a named unit that serves a set of servants on a set of
//! endpoints. Request dispatch is not modelled here; the adapter only
//! tracks its configuration, its servants, and its activation state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};

use crate::error::{IceError, Result};
use crate::proxy::{Endpoint, Identity, LocatorPrx, ObjectPrx, RouterPrx};

/// Implementation object for a remote object.
pub trait Servant: Send + Sync {
    /// Most-derived type id of this servant.
    fn ice_id(&self) -> &str;
}

/// Activation state of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Created, not yet dispatching.
    Holding,
    Active,
    /// Terminal.
    Deactivated,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterState::Holding => write!(f, "HOLDING"),
            AdapterState::Active => write!(f, "ACTIVE"),
            AdapterState::Deactivated => write!(f, "DEACTIVATED"),
        }
    }
}

/// A named endpoint-serving unit.
pub struct ObjectAdapter {
    name: String,
    endpoints: Vec<Endpoint>,
    adapter_id: String,
    state: Mutex<AdapterState>,
    router: RwLock<Option<RouterPrx>>,
    locator: RwLock<Option<LocatorPrx>>,
    servants: RwLock<HashMap<Identity, Arc<dyn Servant>>>,
}

impl ObjectAdapter {
    /// Create an adapter in the holding state.
    ///
    /// `endpoints` is a `:`-separated endpoint list and may be empty.
    pub fn new(name: &str, endpoints: &str, adapter_id: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            endpoints: Endpoint::parse_list(endpoints)?,
            adapter_id: adapter_id.to_string(),
            state: Mutex::new(AdapterState::Holding),
            router: RwLock::new(None),
            locator: RwLock::new(None),
            servants: RwLock::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn adapter_id(&self) -> &str {
        &self.adapter_id
    }

    /// Anonymous adapters have no name and are not addressable by it.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    pub fn state(&self) -> AdapterState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn activate(&self) -> Result<()> {
        self.transition(AdapterState::Active)
    }

    pub fn hold(&self) -> Result<()> {
        self.transition(AdapterState::Holding)
    }

    /// Deactivate the adapter and release its servants. Idempotent.
    pub fn deactivate(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == AdapterState::Deactivated {
                return;
            }
            *state = AdapterState::Deactivated;
        }
        self.servants
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        debug!("Object adapter `{}` deactivated", self.name);
    }

    pub fn is_deactivated(&self) -> bool {
        self.state() == AdapterState::Deactivated
    }

    pub fn add_router(&self, router: RouterPrx) {
        *self.router.write().unwrap_or_else(|e| e.into_inner()) = Some(router);
    }

    pub fn router(&self) -> Option<RouterPrx> {
        self.router.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_locator(&self, locator: Option<LocatorPrx>) {
        *self.locator.write().unwrap_or_else(|e| e.into_inner()) = locator;
    }

    pub fn locator(&self) -> Option<LocatorPrx> {
        self.locator.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Register a servant and return a proxy for it.
    pub fn add(&self, servant: Arc<dyn Servant>, identity: Identity) -> Result<ObjectPrx> {
        self.check_not_deactivated()?;
        let mut servants = self.servants.write().unwrap_or_else(|e| e.into_inner());
        if servants.contains_key(&identity) {
            return Err(IceError::AlreadyRegistered {
                kind: "servant",
                id: identity.to_string(),
            });
        }
        let proxy = self.create_proxy(identity.clone());
        servants.insert(identity, servant);
        Ok(proxy)
    }

    /// Register a servant under a fresh UUID identity.
    pub fn add_with_uuid(&self, servant: Arc<dyn Servant>) -> Result<ObjectPrx> {
        self.add(servant, Identity::new(uuid::Uuid::new_v4().to_string()))
    }

    pub fn remove(&self, identity: &Identity) -> Result<Option<Arc<dyn Servant>>> {
        self.check_not_deactivated()?;
        Ok(self
            .servants
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(identity))
    }

    pub fn find(&self, identity: &Identity) -> Option<Arc<dyn Servant>> {
        self.servants
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .cloned()
    }

    /// Proxy for `identity` on this adapter.
    ///
    /// Direct when the adapter has endpoints, otherwise indirect through the
    /// adapter id (well-known when that is empty too).
    pub fn create_proxy(&self, identity: Identity) -> ObjectPrx {
        if !self.endpoints.is_empty() {
            ObjectPrx::direct(identity, self.endpoints.clone())
        } else {
            ObjectPrx::indirect(identity, self.adapter_id.clone())
        }
    }

    fn transition(&self, next: AdapterState) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == AdapterState::Deactivated {
            return Err(IceError::AdapterDeactivated {
                name: self.name.clone(),
            });
        }
        *state = next;
        Ok(())
    }

    fn check_not_deactivated(&self) -> Result<()> {
        if self.is_deactivated() {
            return Err(IceError::AdapterDeactivated {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectAdapter")
            .field("name", &self.name)
            .field("endpoints", &self.endpoints)
            .field("adapter_id", &self.adapter_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Creates adapters for a runtime instance.
pub trait AdapterFactory: Send + Sync {
    /// Create an adapter. Fails once the factory has been shut down.
    fn create_object_adapter(
        &self,
        name: &str,
        endpoints: &str,
        adapter_id: &str,
    ) -> Result<Arc<ObjectAdapter>>;

    /// Forget an adapter created by this factory and deactivate it.
    ///
    /// Used when creation has to be rolled back; its name becomes free again.
    fn remove_object_adapter(&self, adapter: &Arc<ObjectAdapter>);

    /// Stop accepting new adapters and deactivate existing ones. Idempotent.
    fn shutdown(&self);
}

/// Default [`AdapterFactory`].
///
/// Named adapters must be unique; anonymous adapters are kept in creation
/// order and never collide.
#[derive(Default)]
pub struct ObjectAdapterFactory {
    inner: Mutex<FactoryInner>,
}

#[derive(Default)]
struct FactoryInner {
    shut_down: bool,
    named: HashMap<String, Arc<ObjectAdapter>>,
    anonymous: Vec<Arc<ObjectAdapter>>,
}

impl ObjectAdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a named adapter.
    pub fn find(&self, name: &str) -> Option<Arc<ObjectAdapter>> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .named
            .get(name)
            .cloned()
    }

    /// Number of adapters created and not yet shut down.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.named.len() + inner.anonymous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AdapterFactory for ObjectAdapterFactory {
    fn create_object_adapter(
        &self,
        name: &str,
        endpoints: &str,
        adapter_id: &str,
    ) -> Result<Arc<ObjectAdapter>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.shut_down {
            return Err(IceError::AdapterFactoryShutdown);
        }
        if !name.is_empty() && inner.named.contains_key(name) {
            return Err(IceError::AlreadyRegistered {
                kind: "object adapter",
                id: name.to_string(),
            });
        }

        let adapter = Arc::new(ObjectAdapter::new(name, endpoints, adapter_id)?);
        if name.is_empty() {
            inner.anonymous.push(adapter.clone());
            debug!("Created anonymous object adapter");
        } else {
            inner.named.insert(name.to_string(), adapter.clone());
            info!("Created object adapter `{}` endpoints=[{}] id=`{}`", name, endpoints, adapter_id);
        }
        Ok(adapter)
    }

    fn remove_object_adapter(&self, adapter: &Arc<ObjectAdapter>) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if adapter.is_anonymous() {
                inner.anonymous.retain(|a| !Arc::ptr_eq(a, adapter));
            } else if inner
                .named
                .get(adapter.name())
                .is_some_and(|a| Arc::ptr_eq(a, adapter))
            {
                inner.named.remove(adapter.name());
            }
        }
        adapter.deactivate();
        debug!("Object adapter `{}` removed", adapter.name());
    }

    fn shutdown(&self) {
        let adapters: Vec<Arc<ObjectAdapter>> = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.shut_down {
                return;
            }
            inner.shut_down = true;
            let named = std::mem::take(&mut inner.named).into_values();
            let anonymous = std::mem::take(&mut inner.anonymous);
            named.chain(anonymous).collect()
        };

        for adapter in &adapters {
            adapter.deactivate();
        }
        debug!("Object adapter factory shut down ({} adapters deactivated)", adapters.len());
    }
}
