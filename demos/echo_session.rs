//! Minimal session against a running server.
//!
//! Demonstrates:
//! - Building a bridge with a persistent identity file
//! - Wiring the `name-input` element to the outbound channel
//! - Printing wrapped inbound messages until the connection closes
//!
//! Usage:
//!   cargo run --example echo_session
//!   cargo run --example echo_session -- --name Alex --port 8080
//!   cargo run --example echo_session -- --debug

// ============================================================================
// Imports
// ============================================================================

use anyhow::Context;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use session_bridge::{ConnectionState, NameInput, SessionBridge, ports};

// ============================================================================
// Constants
// ============================================================================

const STORAGE_PATH: &str = "./demo_profile/storage.json";

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    port: u16,
    name: String,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> anyhow::Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        let port = match value_of("--port") {
            Some(port) => port.parse().context("--port expects a number")?,
            None => session_bridge::protocol::DEFAULT_PORT,
        };

        Ok(Self {
            debug: args.iter().any(|a| a == "--debug"),
            port,
            name: value_of("--name").unwrap_or_default(),
        })
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "session_bridge=debug"
    } else {
        "session_bridge=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("[ERROR] {e:#}");
            std::process::exit(2);
        }
    };
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== Echo Session ===\n");

    // ========================================================================
    // Start Bridge
    // ========================================================================

    let (core, bridge_ports) = ports::pair();
    let (mut inbound, outbound) = core.into_parts();

    let mut handle = SessionBridge::builder()
        .port(args.port)
        .storage_path(STORAGE_PATH)
        .error_channel(true)
        .build()
        .context("invalid bridge configuration")?
        .start(bridge_ports)
        .context("failed to start bridge")?;

    println!("[Bridge] Identity: {}", handle.identity());
    println!("         URL:      {}\n", handle.url());

    if let Some(mut events) = handle.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                println!("[Event]  {event:?}");
            }
        });
    }

    // ========================================================================
    // Name Input
    // ========================================================================

    let input = NameInput::new();
    let to_server = outbound.clone();
    input.add_event_listener(move |detail| {
        if let Err(e) = to_server.send(json!({ "SetName": detail.name })) {
            eprintln!("[Input]  Dropped name: {e}");
        }
    });

    handle
        .wait_for_state(ConnectionState::Open)
        .await
        .context("connection never opened")?;
    println!("[Bridge] Open");

    input.type_text(&args.name);
    input.click_confirm();
    println!("[Input]  Sent name {:?}\n", args.name);

    // ========================================================================
    // Relay
    // ========================================================================

    loop {
        tokio::select! {
            message = inbound.recv() => match message {
                Some(message) => println!("[Server] {message}"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\n[Bridge] Shutting down");
                handle.shutdown();
                break;
            }
        }
    }

    let reason = handle.closed().await?;
    println!("[Bridge] Closed: {reason:?}");

    Ok(())
}
