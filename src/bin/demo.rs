//! Loopback demo: one server and one client in a single process.
//!
//! Runs the full asset lifecycle over the in-memory transport: join, state
//! query, start, event poll, acknowledge, stop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use simlink::engine::{InMemoryEngine, SimulationEngine};
use simlink::message::AssetEvent;
use simlink::{loopback, timesrc, Client, RemoteConfig, Server, SimCommand};

const DEFAULT_CONFIG: &str = r#"{
    "client": { "nodeId": "asset-1" },
    "server": { "nodeId": "sim-server" },
    "delta_time_usec": 1000,
    "max_delay_usec": 500000
}"#;

#[derive(Parser)]
#[command(name = "simlink-demo", about = "Run the asset lifecycle over a loopback transport")]
struct Args {
    /// Path to a configuration document; a built-in one is used when absent.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> simlink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RemoteConfig::load(path)?,
        None => RemoteConfig::from_json(DEFAULT_CONFIG)?,
    };

    let (server_ep, client_ep) = loopback::pair();
    let engine = Arc::new(InMemoryEngine::new());
    let time = timesrc::create(&config.time_source_type)?;

    let mut server = Server::initialize(
        &config,
        Arc::clone(&engine) as Arc<dyn SimulationEngine>,
        Arc::new(server_ep),
        time,
    )?;
    if !server.start() {
        return Err(simlink::Error::InvalidState(server.last_error()));
    }

    let client = Client::initialize(&config, &config.client.node_id, Arc::new(client_ep))?;

    if !client.join() {
        info!(error = %client.last_error(), "join refused");
    } else {
        info!("joined");
    }

    if client.get_sim_state() {
        info!(state = ?client.sim_state(), "initial state");
    }

    if client.sim_control(SimCommand::Start) {
        info!("simulation started");
    }

    engine.push_event(&config.client.node_id, AssetEvent::Start);
    if client.get_event() {
        let event = client.event();
        info!(?event, "event fetched");
        if event != AssetEvent::None && client.ack_event(event, true) {
            info!(?event, "event acknowledged");
        }
    }

    if client.get_sim_state() {
        info!(state = ?client.sim_state(), "running state");
    }

    if client.sim_control(SimCommand::Stop) {
        info!("simulation stopped");
    }

    server.stop();
    Ok(())
}
