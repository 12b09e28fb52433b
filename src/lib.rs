//! simlink: request/response RPC substrate for a distributed simulation.
//!
//! Client processes ("assets") call five named services exposed by one
//! server process fronting a simulation engine: Join, GetSimState,
//! SimControl, GetEvent and AckEvent. The crate moves typed payloads across
//! a transport in a self-describing binary container, correlates responses
//! by service name, enforces at most one in-flight request per service, and
//! runs server handlers concurrently with transport polling.
//!
//! The transport and the simulation engine are injected behind traits; an
//! in-memory loopback pair and engine are included for tests and the demo.

pub mod alloc;
pub mod client;
pub mod codec;
pub mod config;
pub mod container;
pub mod context;
pub mod engine;
pub mod error;
pub mod handler;
pub mod loopback;
pub mod mailbox;
pub mod message;
pub mod server;
pub mod timesrc;
pub mod transport;

pub use client::Client;
pub use codec::{decode, encode_into, encode_vec, PduCodec};
pub use config::RemoteConfig;
pub use container::{PduContainer, PduMetadata};
pub use engine::{InMemoryEngine, SimStateInfo, SimulationEngine};
pub use error::{Error, Result};
pub use message::{AssetEvent, ResultCode, ServiceStatus, SimCommand, SimState};
pub use server::Server;
pub use transport::{ClientEndpoint, ClientEvent, ServerEndpoint, ServerEvent};
