//! Transport boundary: the traits the dispatch engine and the client call
//! engine program against.
//!
//! An endpoint owns delivery, correlation surfacing, and timeout detection;
//! this crate never opens sockets itself. Both `poll` operations are
//! non-blocking by contract, so the caller controls its own pacing.

use crate::error::Result;
use crate::message::{ServiceRequestHeader, ServiceResponseHeader};

/// A request as surfaced by a server endpoint: the peeked header plus the
/// full encoded packet (header and body).
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub header: ServiceRequestHeader,
    pub packet: Vec<u8>,
}

/// A response as surfaced by a client endpoint.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    pub header: ServiceResponseHeader,
    pub packet: Vec<u8>,
}

/// One poll outcome on the server side.
#[derive(Debug)]
pub enum ServerEvent {
    /// Nothing arrived.
    None,
    /// A request packet arrived.
    RequestIn(RpcRequest),
    /// The peer asked to cancel the in-flight request of a service.
    RequestCancel(String),
}

/// One poll outcome on the client side.
#[derive(Debug)]
pub enum ClientEvent {
    /// Nothing arrived.
    None,
    /// A response packet arrived.
    ResponseIn(RpcResponse),
    /// The transport gave up waiting for the named service's response.
    ResponseTimeout(String),
}

/// Server-side transport endpoint.
pub trait ServerEndpoint: Send + Sync {
    /// Check for one incoming event without blocking.
    fn poll(&self) -> Result<ServerEvent>;

    /// Send one response packet back to the requesting client.
    fn reply(&self, header: &ServiceResponseHeader, packet: &[u8]) -> Result<()>;
}

/// Client-side transport endpoint.
pub trait ClientEndpoint: Send + Sync {
    /// Send one request packet. `timeout_usec` arms the endpoint's response
    /// timer; a non-positive value means wait forever.
    fn send_request(
        &self,
        header: &ServiceRequestHeader,
        packet: &[u8],
        timeout_usec: i64,
    ) -> Result<()>;

    /// Check for one incoming event without blocking.
    fn poll(&self) -> Result<ClientEvent>;
}
