//! Example: event channel loopback
//!
//! A component publishes each value it echoes on an event channel and
//! subscribes to the same channel, so one seed value keeps circulating until
//! the message limit suppresses the next echo.
//!
//! Usage:
//!   cargo run --example ecm_loopback -- --limit 5
//!
//! With a deferred overflow policy and a rolling window:
//!   cargo run --example ecm_loopback -- \
//!       --limit 5 --window-ms 200 --policy defer --run-ms 1000
//!
//! With a property file:
//!   cargo run --example ecm_loopback -- --properties ecm.properties

use clap::Parser;
use ecm_component::processors::SequenceEcho;
use ecm_component::runtime::OverflowPolicy;
use ecm_component::{Component, ComponentProperties, EventChannelManager, PropertyFile};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::info;

const CHANNEL: &str = "test1";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Transmit budget per window (0 = unlimited)
    #[arg(short, long, default_value = "5")]
    limit: u64,

    /// Accounting window in milliseconds (0 = whole run)
    #[arg(long, default_value = "0")]
    window_ms: u64,

    /// Overflow policy: drop or defer
    #[arg(long, default_value = "drop")]
    policy: OverflowPolicy,

    /// How long to let the component run
    #[arg(long, default_value = "500")]
    run_ms: u64,

    /// Property file to load instead of the flags above
    #[arg(long)]
    properties: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("=== ECM Loopback Example ===");

    let manager = EventChannelManager::<u64>::new(64);
    let input = manager.subscriber("ecm", CHANNEL)?;
    let output = manager.publisher("ecm", CHANNEL)?;
    let driver = manager.publisher("driver", CHANNEL)?;

    let mut component = Component::new("ecm", SequenceEcho::new(0), input, output);
    match &args.properties {
        Some(path) => component.load_properties(&PropertyFile::new(path))?,
        None => {
            let window = (args.window_ms > 0).then(|| Duration::from_millis(args.window_ms));
            let properties = ComponentProperties::default()
                .with_message_limit(args.limit)
                .with_limit_window(window)
                .with_overflow_policy(args.policy)
                .with_poll_interval(Duration::from_millis(20));
            component.load_properties(&properties)?;
        }
    }

    info!("Component {} ({})", component.label(), component.identifier());
    for port in component.port_set() {
        info!("  port {} [{}] carries {}", port.name, port.direction, port.type_name);
    }

    component.start()?;
    driver.push(0).map_err(|rejected| rejected.error)?;
    thread::sleep(Duration::from_millis(args.run_ms));
    component.stop()?;

    for (id, value) in component.snapshot() {
        info!("  {} = {}", id, value);
    }
    info!("Worker status: {:?}", component.worker_status());

    component.release_object()?;
    Ok(())
}
