//! Ice Server - hosts one object adapter until interrupted.
//!
//! Runtime options are given as `--Ice.*` arguments anywhere on the command
//! line and are stripped before the server's own options are parsed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use ice_core::config::PropertyNames;
use ice_core::{Communicator, ObjectAdapter, Properties, Servant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const RUNTIME_OPTION: &str = "--Ice.";

#[derive(Parser, Debug)]
#[command(name = "ice-server")]
#[command(about = "Host an object adapter on an Ice communicator")]
struct Args {
    /// Adapter name; `<name>.Endpoints` and `<name>.AdapterId` configure it
    #[arg(short, long, default_value = "Server")]
    name: String,

    /// Endpoints to listen on (overrides `<name>.Endpoints`)
    #[arg(short, long)]
    endpoints: Option<String>,

    /// Property file to load (same as `--Ice.Config=<path>`)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print the effective properties as JSON and continue
    #[arg(long)]
    print_properties: bool,
}

/// Servant registered so the adapter has something to hand out.
struct Echo;

impl Servant for Echo {
    fn ice_id(&self) -> &str {
        "::Ice::Object"
    }
}

fn main() -> Result<()> {
    let mut argv: Vec<String> = std::env::args().collect();
    let args = Args::parse_from(argv.iter().filter(|arg| !arg.starts_with(RUNTIME_OPTION)));

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Ice server");

    // Base properties; `--Ice.*` options in argv are applied on top.
    let properties = Properties::new();
    if let Some(path) = &args.config {
        properties.set_property(PropertyNames::CONFIG, &path.display().to_string());
    }
    properties.set_property(PropertyNames::PROGRAM_NAME, "ice-server");

    let communicator = Arc::new(ice_core::initialize_with_properties(&mut argv, properties)?);

    let result = serve(&communicator, &args);
    communicator.destroy();
    result
}

fn serve(communicator: &Arc<Communicator>, args: &Args) -> Result<()> {
    let adapter = create_adapter(communicator, args)?;
    adapter.activate()?;

    let proxy = adapter.add_with_uuid(Arc::new(Echo))?;
    // Intentional stdout: clients read the proxy from here
    println!("PROXY={}", communicator.proxy_to_string(Some(&proxy))?);

    if args.print_properties {
        let snapshot = communicator.properties()?.snapshot();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    let signalled = communicator.clone();
    ctrlc::set_handler(move || signalled.shutdown())?;

    info!("Adapter `{}` active, waiting for shutdown", adapter.name());
    communicator.wait_for_shutdown();
    info!("Shutdown signal received, exiting");

    Ok(())
}

fn create_adapter(communicator: &Communicator, args: &Args) -> Result<Arc<ObjectAdapter>> {
    let adapter = match &args.endpoints {
        Some(endpoints) => communicator.create_object_adapter_with_endpoints(&args.name, endpoints)?,
        None => communicator.create_object_adapter(&args.name)?,
    };
    Ok(adapter)
}
