//! Integration tests for the Communicator lifecycle and delegation surface.
//!
//! Collaborators are replaced with counting doubles so the tests can observe
//! exactly which calls the communicator makes into them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use ice_core::{
    AdapterFactory, Communicator, IceError, Identity, Lifecycle, Logger, LocatorPrx, ObjectAdapter,
    ObjectAdapterFactory, ObjectFactory, ObjectPrx, Properties, RegisteredFactory, RouterPrx,
    Servant, ThreadPool, UserException, UserExceptionFactory, WorkerPool,
};

// ========================================
// Test doubles
// ========================================

#[derive(Default)]
struct RecordingAdapterFactory {
    inner: ObjectAdapterFactory,
    created: Mutex<Vec<(String, String, String)>>,
    shutdowns: AtomicUsize,
    /// Adapters with this name block inside creation until released.
    gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    gated_name: Mutex<Option<String>>,
}

impl RecordingAdapterFactory {
    fn created(&self) -> Vec<(String, String, String)> {
        self.created.lock().unwrap().clone()
    }
}

impl AdapterFactory for RecordingAdapterFactory {
    fn create_object_adapter(
        &self,
        name: &str,
        endpoints: &str,
        adapter_id: &str,
    ) -> ice_core::Result<Arc<ObjectAdapter>> {
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), endpoints.to_string(), adapter_id.to_string()));

        let gated = self.gated_name.lock().unwrap().as_deref() == Some(name);
        if gated {
            let gate = self.gate.lock().unwrap().take();
            if let Some((entered, release)) = gate {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
        }

        self.inner.create_object_adapter(name, endpoints, adapter_id)
    }

    fn remove_object_adapter(&self, adapter: &Arc<ObjectAdapter>) {
        self.inner.remove_object_adapter(adapter);
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown();
    }
}

#[derive(Default)]
struct CountingPool {
    initiated: AtomicUsize,
    waited: AtomicUsize,
    destroyed: AtomicUsize,
}

impl WorkerPool for CountingPool {
    fn initiate_shutdown(&self) {
        self.initiated.fetch_add(1, Ordering::SeqCst);
    }

    fn wait_until_finished(&self) {
        self.waited.fetch_add(1, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct CapturingLogger {
    warnings: Mutex<Vec<String>>,
}

impl Logger for CapturingLogger {
    fn print(&self, _message: &str) {}
    fn trace(&self, _category: &str, _message: &str) {}
    fn warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
    fn error(&self, _message: &str) {}
}

struct Printer;

impl Servant for Printer {
    fn ice_id(&self) -> &str {
        "::Demo::Printer"
    }
}

struct PrinterFactory;

impl RegisteredFactory for PrinterFactory {}

impl ObjectFactory for PrinterFactory {
    fn create(&self, type_id: &str) -> Option<Arc<dyn Servant>> {
        (type_id == "::Demo::Printer").then(|| Arc::new(Printer) as Arc<dyn Servant>)
    }
}

struct OutOfPaperFactory;

impl RegisteredFactory for OutOfPaperFactory {}

impl UserExceptionFactory for OutOfPaperFactory {
    fn create(&self, type_id: &str) -> Option<UserException> {
        Some(UserException::new(type_id, "out of paper"))
    }
}

struct Harness {
    communicator: Arc<Communicator>,
    adapters: Arc<RecordingAdapterFactory>,
    pool: Arc<CountingPool>,
    pools_created: Arc<AtomicUsize>,
    logger: Arc<CapturingLogger>,
}

fn harness_with(properties: Properties) -> Harness {
    let adapters = Arc::new(RecordingAdapterFactory::default());
    let pool = Arc::new(CountingPool::default());
    let pools_created = Arc::new(AtomicUsize::new(0));
    let logger = Arc::new(CapturingLogger::default());

    let pool_for_factory = pool.clone();
    let created_for_factory = pools_created.clone();
    let communicator = Communicator::builder()
        .properties(properties)
        .logger(logger.clone())
        .adapter_factory(adapters.clone())
        .worker_pool_factory(move |_props: &Properties| {
            created_for_factory.fetch_add(1, Ordering::SeqCst);
            Ok(pool_for_factory.clone() as Arc<dyn WorkerPool>)
        })
        .build()
        .finish_setup(&mut Vec::new())
        .unwrap();

    Harness {
        communicator: Arc::new(communicator),
        adapters,
        pool,
        pools_created,
        logger,
    }
}

fn harness() -> Harness {
    harness_with(Properties::new())
}

fn proxy(s: &str) -> ObjectPrx {
    s.parse().unwrap()
}

// ========================================
// Destroy
// ========================================

#[test]
fn test_concurrent_destroy_tears_down_once() {
    let h = harness();
    h.communicator.create_object_adapter("").unwrap();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let communicator = h.communicator.clone();
            thread::spawn(move || communicator.destroy())
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(h.adapters.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(h.pool.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(h.communicator.lifecycle(), Lifecycle::Destroyed);
}

#[test]
fn test_destroy_releases_pool_handle() {
    let h = harness();
    h.communicator.create_object_adapter("").unwrap();
    h.communicator.destroy();

    h.communicator.shutdown();
    h.communicator.wait_for_shutdown();

    assert_eq!(h.pool.initiated.load(Ordering::SeqCst), 0);
    assert_eq!(h.pool.waited.load(Ordering::SeqCst), 0);
}

#[test]
fn test_guarded_operations_fail_after_destroy() {
    let h = harness();
    let c = &h.communicator;
    c.destroy();

    let destroyed = |r: ice_core::Result<()>| matches!(r, Err(IceError::CommunicatorDestroyed));

    assert!(destroyed(c.string_to_proxy("Printer:tcp -p 1").map(|_| ())));
    assert!(destroyed(c.proxy_to_string(None).map(|_| ())));
    assert!(destroyed(c.create_object_adapter("Foo").map(|_| ())));
    assert!(destroyed(c.create_object_adapter("").map(|_| ())));
    assert!(destroyed(c.create_object_adapter_with_endpoints("Foo", "tcp -p 1").map(|_| ())));
    assert!(destroyed(c.add_object_factory(Arc::new(PrinterFactory), "::Demo::Printer")));
    assert!(destroyed(c.remove_object_factory("::Demo::Printer").map(|_| ())));
    assert!(destroyed(c.find_object_factory("::Demo::Printer").map(|_| ())));
    assert!(destroyed(c.add_user_exception_factory(Arc::new(OutOfPaperFactory), "::Demo::OutOfPaper")));
    assert!(destroyed(c.remove_user_exception_factory("::Demo::OutOfPaper").map(|_| ())));
    assert!(destroyed(c.find_user_exception_factory("::Demo::OutOfPaper").map(|_| ())));
    assert!(destroyed(c.properties().map(|_| ())));
    assert!(destroyed(c.logger().map(|_| ())));
    assert!(destroyed(c.set_logger(Arc::new(CapturingLogger::default()))));
    assert!(destroyed(c.default_locator().map(|_| ())));

    // Unguarded operations keep working.
    c.shutdown();
    c.wait_for_shutdown();
    c.set_default_router(Some(RouterPrx::unchecked_cast(proxy("router:tcp -p 1"))));
    c.set_default_locator(Some(LocatorPrx::unchecked_cast(proxy("locator:tcp -p 2"))));
    c.destroy();
}

// ========================================
// Shutdown
// ========================================

#[test]
fn test_shutdown_is_noop_before_first_adapter() {
    let h = harness();
    for _ in 0..5 {
        h.communicator.shutdown();
        h.communicator.wait_for_shutdown();
    }

    assert_eq!(h.pools_created.load(Ordering::SeqCst), 0);
    assert_eq!(h.pool.initiated.load(Ordering::SeqCst), 0);
    assert_eq!(h.pool.waited.load(Ordering::SeqCst), 0);
    h.communicator.destroy();
}

#[test]
fn test_first_adapter_creates_pool_once() {
    let h = harness();
    h.communicator.create_object_adapter("").unwrap();
    h.communicator.create_object_adapter("Foo").unwrap();
    h.communicator.create_object_adapter("").unwrap();

    assert_eq!(h.pools_created.load(Ordering::SeqCst), 1);

    h.communicator.shutdown();
    assert_eq!(h.pool.initiated.load(Ordering::SeqCst), 1);
    h.communicator.wait_for_shutdown();
    assert_eq!(h.pool.waited.load(Ordering::SeqCst), 1);
    h.communicator.destroy();
}

#[test]
fn test_named_adapter_also_initializes_pool() {
    let h = harness();
    h.communicator.create_object_adapter("Foo").unwrap();
    h.communicator.shutdown();
    assert_eq!(h.pool.initiated.load(Ordering::SeqCst), 1);
    h.communicator.destroy();
}

#[test]
fn test_failed_adapter_creation_does_not_initialize_pool() {
    let h = harness();
    let props = h.communicator.properties().unwrap();
    props.set_property("Bad.Endpoints", "tcp -p not-a-port");
    assert!(h.communicator.create_object_adapter("Bad").is_err());
    assert_eq!(h.pools_created.load(Ordering::SeqCst), 0);
    h.communicator.destroy();
}

#[test]
fn test_shutdown_does_not_wait_for_main_lock() {
    let h = harness();
    h.communicator.create_object_adapter("").unwrap();

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    *h.adapters.gate.lock().unwrap() = Some((entered_tx, release_rx));
    *h.adapters.gated_name.lock().unwrap() = Some("Slow".to_string());

    let communicator = h.communicator.clone();
    let creator = thread::spawn(move || communicator.create_object_adapter("Slow").map(|_| ()));

    // The creator thread now holds the main lock inside the adapter factory.
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    h.communicator.shutdown();
    h.communicator.wait_for_shutdown();
    assert_eq!(h.pool.initiated.load(Ordering::SeqCst), 1);
    assert_eq!(h.pool.waited.load(Ordering::SeqCst), 1);

    release_tx.send(()).unwrap();
    creator.join().unwrap().unwrap();
    h.communicator.destroy();
}

#[test]
fn test_wait_for_shutdown_with_real_pool() {
    let communicator = Arc::new(
        Communicator::builder()
            .build()
            .finish_setup(&mut Vec::new())
            .unwrap(),
    );
    communicator.create_object_adapter("").unwrap();

    let waiter = {
        let communicator = communicator.clone();
        thread::spawn(move || communicator.wait_for_shutdown())
    };

    // Guarded calls still go through while the waiter blocks.
    thread::sleep(Duration::from_millis(20));
    assert!(communicator.string_to_proxy("Printer:tcp -p 1").unwrap().is_some());

    communicator.shutdown();
    waiter.join().unwrap();
    communicator.destroy();
}

#[test]
fn test_shutdown_racing_destroy() {
    for _ in 0..20 {
        let communicator = Arc::new(
            Communicator::builder()
                .worker_pool_factory(|_props: &Properties| {
                    Ok(Arc::new(ThreadPool::new("race", 2)?) as Arc<dyn WorkerPool>)
                })
                .build()
                .finish_setup(&mut Vec::new())
                .unwrap(),
        );
        communicator.create_object_adapter("").unwrap();

        let signallers: Vec<_> = (0..4)
            .map(|_| {
                let communicator = communicator.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        communicator.shutdown();
                    }
                })
            })
            .collect();
        communicator.destroy();
        for s in signallers {
            s.join().unwrap();
        }
        communicator.wait_for_shutdown();
    }
}

// ========================================
// Adapters
// ========================================

#[test]
fn test_anonymous_adapter_ignores_properties() {
    let props = Properties::new();
    props.set_property(".Endpoints", "tcp -p 1");
    props.set_property(".AdapterId", "X");
    props.set_property("Ice.Adapter..Locator", "locator:tcp -p 2");
    let h = harness_with(props);

    let adapter = h.communicator.create_object_adapter("").unwrap();

    assert!(adapter.is_anonymous());
    assert!(adapter.endpoints().is_empty());
    assert_eq!(adapter.adapter_id(), "");
    assert!(adapter.locator().is_none());
    assert_eq!(h.adapters.created(), vec![(String::new(), String::new(), String::new())]);
    h.communicator.destroy();
}

#[test]
fn test_named_adapter_reads_properties() {
    let props = Properties::new();
    props.set_property("Foo.AdapterId", "X");
    props.set_property("Foo.Endpoints", "tcp -h h -p 1");
    let h = harness_with(props);

    let adapter = h.communicator.create_object_adapter("Foo").unwrap();

    assert_eq!(
        h.adapters.created(),
        vec![("Foo".to_string(), "tcp -h h -p 1".to_string(), "X".to_string())]
    );
    assert_eq!(adapter.adapter_id(), "X");
    assert_eq!(adapter.endpoints()[0].to_string(), "tcp -h h -p 1");
    h.communicator.destroy();
}

#[test]
fn test_named_adapter_router() {
    let props = Properties::new();
    props.set_property("Ice.Adapter.Foo.Router", "Glacier/router:tcp -h r -p 4063");
    props.set_property("Ice.Adapter.Foo.Locator", "IceGrid/Locator:tcp -p 4061");
    let h = harness_with(props);

    let adapter = h.communicator.create_object_adapter("Foo").unwrap();

    let router = adapter.router().unwrap();
    assert_eq!(router.as_object(), &proxy("Glacier/router:tcp -h r -p 4063"));
    assert!(adapter.locator().is_none());
    h.communicator.destroy();
}

#[test]
fn test_named_adapter_locator() {
    let props = Properties::new();
    props.set_property("Ice.Adapter.Foo.Locator", "IceGrid/Locator:tcp -p 4061");
    let h = harness_with(props);
    h.communicator
        .set_default_locator(Some(LocatorPrx::unchecked_cast(proxy("Default/Locator:tcp -p 1"))));

    let adapter = h.communicator.create_object_adapter("Foo").unwrap();

    assert!(adapter.router().is_none());
    assert_eq!(
        adapter.locator().unwrap().as_object(),
        &proxy("IceGrid/Locator:tcp -p 4061")
    );
    h.communicator.destroy();
}

#[test]
fn test_named_adapter_default_locator() {
    let h = harness();
    let default = LocatorPrx::unchecked_cast(proxy("Default/Locator:tcp -p 1"));
    h.communicator.set_default_locator(Some(default.clone()));

    let adapter = h.communicator.create_object_adapter("Foo").unwrap();
    assert_eq!(adapter.locator(), Some(default));
    h.communicator.destroy();

    let h = harness();
    let adapter = h.communicator.create_object_adapter("Foo").unwrap();
    assert_eq!(adapter.locator(), None);
    h.communicator.destroy();
}

#[test]
fn test_default_locator_from_properties() {
    let props = Properties::new();
    props.set_property("Ice.Default.Locator", "IceGrid/Locator:tcp -p 4061");
    let h = harness_with(props);

    let adapter = h.communicator.create_object_adapter("Foo").unwrap();
    assert_eq!(
        adapter.locator().unwrap().as_object(),
        &proxy("IceGrid/Locator:tcp -p 4061")
    );
    h.communicator.destroy();
}

#[test]
fn test_bad_router_property_creates_no_adapter() {
    let props = Properties::new();
    props.set_property("Ice.Adapter.Foo.Router", "router:pigeon -p 1");
    let h = harness_with(props);

    let err = h.communicator.create_object_adapter("Foo").unwrap_err();
    assert!(matches!(err, IceError::EndpointParse { .. }));
    assert!(h.adapters.created().is_empty());
    h.communicator.destroy();
}

#[test]
fn test_pool_failure_rolls_back_adapter() {
    let broken = Arc::new(AtomicBool::new(true));
    let adapters = Arc::new(ObjectAdapterFactory::new());
    let broken_for_factory = broken.clone();
    let communicator = Communicator::builder()
        .adapter_factory(adapters.clone())
        .worker_pool_factory(move |_props: &Properties| {
            if broken_for_factory.load(Ordering::SeqCst) {
                return Err(IceError::Config {
                    message: "no workers available".to_string(),
                });
            }
            Ok(Arc::new(CountingPool::default()) as Arc<dyn WorkerPool>)
        })
        .build()
        .finish_setup(&mut Vec::new())
        .unwrap();

    let err = communicator.create_object_adapter("Foo").unwrap_err();
    assert!(matches!(err, IceError::Config { .. }));
    assert!(adapters.find("Foo").is_none());
    assert!(adapters.is_empty());

    broken.store(false, Ordering::SeqCst);
    let adapter = communicator.create_object_adapter("Foo").unwrap();
    assert!(!adapter.is_deactivated());
    assert!(Arc::ptr_eq(&adapters.find("Foo").unwrap(), &adapter));
    communicator.destroy();
}

#[test]
fn test_negative_pool_size_allows_retry() {
    let props = Properties::new();
    props.set_property("Ice.ServerThreadPool.Size", "-1");
    let communicator = ice_core::initialize_with_properties(&mut Vec::new(), props).unwrap();

    let err = communicator.create_object_adapter("Foo").unwrap_err();
    assert!(matches!(err, IceError::Config { .. }));

    communicator
        .properties()
        .unwrap()
        .set_property("Ice.ServerThreadPool.Size", "1");
    communicator.create_object_adapter("Foo").unwrap();
    communicator.destroy();
}

#[test]
fn test_blank_routing_properties_fall_through() {
    let props = Properties::new();
    props.set_property("Ice.Adapter.Foo.Router", "   ");
    props.set_property("Ice.Adapter.Foo.Locator", "IceGrid/Locator:tcp -p 4061");
    props.set_property("Ice.Adapter.Bar.Router", " ");
    props.set_property("Ice.Adapter.Bar.Locator", "\t");
    let h = harness_with(props);
    let default = LocatorPrx::unchecked_cast(proxy("Default/Locator:tcp -p 1"));
    h.communicator.set_default_locator(Some(default.clone()));

    let foo = h.communicator.create_object_adapter("Foo").unwrap();
    assert!(foo.router().is_none());
    assert_eq!(
        foo.locator().unwrap().as_object(),
        &proxy("IceGrid/Locator:tcp -p 4061")
    );

    let bar = h.communicator.create_object_adapter("Bar").unwrap();
    assert!(bar.router().is_none());
    assert_eq!(bar.locator(), Some(default));
    h.communicator.destroy();
}

#[test]
fn test_create_with_endpoints_writes_property() {
    let h = harness();
    let adapter = h
        .communicator
        .create_object_adapter_with_endpoints("Hello", "tcp -h localhost -p 10000")
        .unwrap();

    let props = h.communicator.properties().unwrap();
    assert_eq!(props.get_property("Hello.Endpoints"), "tcp -h localhost -p 10000");
    assert_eq!(adapter.endpoints().len(), 1);

    let prx = adapter.add(Arc::new(Printer), Identity::new("printer")).unwrap();
    assert_eq!(
        h.communicator.proxy_to_string(Some(&prx)).unwrap(),
        "printer -t:tcp -h localhost -p 10000"
    );
    h.communicator.destroy();
}

#[test]
fn test_destroy_deactivates_adapters() {
    let h = harness();
    let adapter = h.communicator.create_object_adapter("Foo").unwrap();
    adapter.activate().unwrap();
    h.communicator.destroy();
    assert!(adapter.is_deactivated());
}

// ========================================
// Proxies
// ========================================

#[test]
fn test_proxy_round_trip_through_communicator() {
    let h = harness();
    let c = &h.communicator;

    assert_eq!(c.string_to_proxy("").unwrap(), None);
    assert_eq!(c.proxy_to_string(None).unwrap(), "");

    let prx = c.string_to_proxy("Demo/Printer @ PrinterAdapter").unwrap().unwrap();
    assert_eq!(prx.adapter_id(), "PrinterAdapter");
    assert!(c.string_to_proxy("Printer:").is_err());
    c.destroy();
}

// ========================================
// Factories
// ========================================

#[test]
fn test_object_factory_registry() {
    let h = harness();
    let c = &h.communicator;

    c.add_object_factory(Arc::new(PrinterFactory), "::Demo::Printer").unwrap();
    let err = c
        .add_object_factory(Arc::new(PrinterFactory), "::Demo::Printer")
        .unwrap_err();
    assert!(matches!(err, IceError::AlreadyRegistered { .. }));

    let factory = c.find_object_factory("::Demo::Printer").unwrap().unwrap();
    assert_eq!(factory.create("::Demo::Printer").unwrap().ice_id(), "::Demo::Printer");

    assert!(c.find_object_factory("::Demo::Missing").unwrap().is_none());
    assert!(c.remove_object_factory("::Demo::Missing").unwrap().is_none());
    assert!(c.remove_object_factory("::Demo::Printer").unwrap().is_some());
    assert!(c.find_object_factory("::Demo::Printer").unwrap().is_none());
    c.destroy();
}

#[test]
fn test_user_exception_factory_registry() {
    let h = harness();
    let c = &h.communicator;

    c.add_user_exception_factory(Arc::new(OutOfPaperFactory), "::Demo::OutOfPaper")
        .unwrap();
    let factory = c
        .find_user_exception_factory("::Demo::OutOfPaper")
        .unwrap()
        .unwrap();
    let ex = factory.create("::Demo::OutOfPaper").unwrap();
    assert_eq!(ex.message, "out of paper");

    assert!(c.remove_user_exception_factory("::Demo::OutOfPaper").unwrap().is_some());
    assert!(c.find_user_exception_factory("::Demo::OutOfPaper").unwrap().is_none());
    c.destroy();
}

// ========================================
// Logger and leak diagnostic
// ========================================

#[test]
fn test_leak_warning_emitted_once() {
    let h = harness();
    let logger = h.logger.clone();
    drop(h);

    let warnings = logger.warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0], "Communicator::destroy() has not been called");
}

#[test]
fn test_no_leak_warning_after_destroy() {
    let h = harness();
    h.communicator.destroy();
    let logger = h.logger.clone();
    drop(h);

    assert!(logger.warnings.lock().unwrap().is_empty());
}

#[test]
fn test_set_logger_receives_leak_warning() {
    let h = harness();
    let replacement = Arc::new(CapturingLogger::default());
    h.communicator.set_logger(replacement.clone()).unwrap();
    let original = h.logger.clone();
    drop(h);

    assert!(original.warnings.lock().unwrap().is_empty());
    assert_eq!(replacement.warnings.lock().unwrap().len(), 1);
}

// ========================================
// Initialization
// ========================================

#[test]
fn test_initialize_strips_runtime_args() {
    let mut args = vec![
        "server".to_string(),
        "--Ice.ServerThreadPool.Size=2".to_string(),
        "--verbose".to_string(),
    ];
    let communicator = ice_core::initialize(&mut args).unwrap();

    assert_eq!(args, vec!["server", "--verbose"]);
    assert_eq!(
        communicator
            .properties()
            .unwrap()
            .get_property("Ice.ServerThreadPool.Size"),
        "2"
    );
    communicator.destroy();
}

#[test]
fn test_initialize_with_bad_config_fails() {
    let mut args = vec!["--Ice.Config=/nonexistent/ice.cfg".to_string()];
    let err = ice_core::initialize(&mut args).err().unwrap();
    assert!(matches!(err, IceError::Io { .. }));
}
