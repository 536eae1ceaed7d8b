//! # batchio Scheduler Binary
//!
//! Loads an I/O configuration, builds the runtime and drives every
//! transaction's read and write task at its configured period.
//!
//! # Usage
//!
//! ```bash
//! # Run with the configured driver
//! batchio --config config/batchio.toml
//!
//! # Override the driver
//! batchio --config config/batchio.toml --driver simulation
//!
//! # Verbose logging (otherwise `[shared] log_level`, or `RUST_LOG`)
//! batchio -c config/batchio.toml -v
//! ```

use batchio_common::config::ConfigLoader;
use batchio_common::data::Value;
use batchio_common::error::DisplayError;
use batchio_common::event::EventNotice;
use batchio_common::io::config::IoConfig;
use batchio_common::model::attributes;
use batchio_driver::{DeviceRegistry, Runtime};
use clap::Parser;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// batchio - periodic batched I/O against one device
#[derive(Parser, Debug)]
#[command(name = "batchio")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Batched I/O transactions driven at configured periods")]
#[command(long_about = None)]
struct Args {
    /// Path to the I/O configuration file.
    #[arg(short, long, default_value = "config/batchio.toml")]
    config: PathBuf,

    /// Device driver to use instead of the configured one.
    #[arg(short, long)]
    driver: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("batchio startup failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = IoConfig::load(&args.config);
    let level = match &loaded {
        Ok(config) if !args.verbose => config.shared.log_level.as_directive(),
        _ if args.verbose => "debug",
        _ => "info",
    };
    setup_tracing(&args, level);

    info!("batchio v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = loaded?;
    if let Some(driver) = args.driver {
        info!("Driver from CLI: {}", driver);
        config.device.driver = driver;
    }
    config.validate()?;

    let registry = DeviceRegistry::with_builtin();
    let runtime = Runtime::from_config(config, &registry)?;

    // Setup signal handler.
    let running = runtime.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    watch_status_events(&runtime);

    let stats = runtime.run();
    info!(
        "batchio shutdown complete ({} reads, {} writes, {} overruns)",
        stats.reads, stats.writes, stats.overruns
    );
    Ok(())
}

/// Log every transaction status transition with the error it moved to.
fn watch_status_events(runtime: &Runtime) {
    for transaction in runtime.transactions() {
        let name = transaction.name().to_string();
        let _ = transaction.for_each_event(&mut |event| {
            let attribute = if event.name().starts_with("read") {
                attributes::READ_ERROR
            } else {
                attributes::WRITE_ERROR
            };
            let Some(status) = transaction.make_read_handle(&attribute) else {
                return ControlFlow::Continue(());
            };
            let name = name.clone();
            event.subscribe(move |notice: &EventNotice| {
                let error = match status.read() {
                    Ok(Value::Error(error)) => error,
                    _ => None,
                };
                match error {
                    Some(e) => warn!(
                        transaction = %name,
                        event = notice.name,
                        code = e.code(),
                        status = %DisplayError(&error),
                        "transaction status changed"
                    ),
                    None => info!(
                        transaction = %name,
                        event = notice.name,
                        status = %DisplayError(&error),
                        "transaction status changed"
                    ),
                }
            });
            ControlFlow::Continue(())
        });
    }
}

/// Setup tracing subscriber based on CLI arguments.
///
/// `RUST_LOG` wins over `level`.
fn setup_tracing(args: &Args, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
