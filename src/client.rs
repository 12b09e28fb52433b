//! Client call engine.
//!
//! Synchronous calls over an asynchronous polling endpoint: `call` encodes
//! and sends, `wait_response_for` busy-polls until the expected service's
//! response, a transport timeout, or a mismatched response arrives. The
//! five public operations are the call+wait pair plus result-code checks;
//! each reports success as `bool` with the failure reason retrievable
//! through `last_error`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::codec::{decode, encode_vec, PduCodec};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::message::{
    peek_request_header, AckEventRequest, AckEventResponse, AssetEvent, GetEventRequest,
    GetEventResponse, GetSimStateRequest, GetSimStateResponse, JoinRequest, JoinResponse,
    RequestPacket, ResponsePacket, ResultCode, ServiceRequestHeader, SimCommand,
    SimControlRequest, SimControlResponse, SERVICE_ACK_EVENT, SERVICE_GET_EVENT,
    SERVICE_GET_SIM_STATE, SERVICE_JOIN, SERVICE_SIM_CONTROL,
};
use crate::transport::{ClientEndpoint, ClientEvent, RpcResponse};

const POLL_SLEEP: Duration = Duration::from_micros(100);

/// One asset's client.
pub struct Client {
    endpoint: Arc<dyn ClientEndpoint>,
    client_name: String,
    default_timeout_usec: i64,
    request_seq: AtomicU32,
    last_error: Mutex<String>,
    last_sim_state: Mutex<Option<GetSimStateResponse>>,
    last_event: Mutex<AssetEvent>,
}

impl Client {
    /// Build a client for `name`, which must match the configured client
    /// node identity.
    pub fn initialize(
        config: &RemoteConfig,
        name: &str,
        endpoint: Arc<dyn ClientEndpoint>,
    ) -> Result<Self> {
        if name != config.client.node_id {
            return Err(Error::InvalidState(format!(
                "client name {name:?} does not match configured nodeId {:?}",
                config.client.node_id
            )));
        }
        Ok(Self {
            endpoint,
            client_name: name.to_owned(),
            default_timeout_usec: config.max_delay_usec.unwrap_or(-1),
            request_seq: AtomicU32::new(1),
            last_error: Mutex::new(String::new()),
            last_sim_state: Mutex::new(None),
            last_event: Mutex::new(AssetEvent::None),
        })
    }

    /// The reason the most recent operation failed.
    pub fn last_error(&self) -> String {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(client = %self.client_name, error = %message, "operation failed");
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = message;
    }

    fn next_header(&self, service: &str) -> ServiceRequestHeader {
        ServiceRequestHeader {
            request_id: self.request_seq.fetch_add(1, Ordering::SeqCst),
            service_name: service.to_owned(),
            client_name: self.client_name.clone(),
            opcode: 0,
            poll_interval_msec: 0,
        }
    }

    /// Send one encoded request packet. Reports send success only; the
    /// response is collected separately through [`Client::wait_response_for`].
    pub fn call(&self, service: &str, packet: &[u8], timeout_usec: i64) -> bool {
        let header = match peek_request_header(packet) {
            Ok(h) => h,
            Err(e) => {
                self.set_error(format!("malformed request packet: {e}"));
                return false;
            }
        };
        debug!(service = %service, request_id = header.request_id, "call");
        match self.endpoint.send_request(&header, packet, timeout_usec) {
            Ok(()) => true,
            Err(e) => {
                self.set_error(format!("send to {service} failed: {e}"));
                false
            }
        }
    }

    /// Busy-poll until the named service's response arrives.
    ///
    /// A transport timeout or a response for any other service is a failure;
    /// out-of-order responses are not buffered.
    pub fn wait_response_for(&self, service: &str) -> Option<RpcResponse> {
        loop {
            match self.endpoint.poll() {
                Ok(ClientEvent::ResponseIn(response)) => {
                    if response.header.service_name == service {
                        return Some(response);
                    }
                    self.set_error(
                        Error::UnexpectedService {
                            expected: service.to_owned(),
                            got: response.header.service_name,
                        }
                        .to_string(),
                    );
                    return None;
                }
                Ok(ClientEvent::ResponseTimeout(timed_out)) => {
                    self.set_error(Error::ResponseTimeout { service: timed_out }.to_string());
                    return None;
                }
                Ok(ClientEvent::None) => std::thread::sleep(POLL_SLEEP),
                Err(e) => {
                    self.set_error(format!("transport poll failed: {e}"));
                    return None;
                }
            }
        }
    }

    fn invoke<Req, Resp>(&self, service: &str, body: Req) -> Option<ResponsePacket<Resp>>
    where
        Req: PduCodec,
        Resp: PduCodec,
    {
        let packet = RequestPacket {
            header: self.next_header(service),
            body,
        };
        let bytes = match encode_vec(&packet) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.set_error(format!("encoding request for {service} failed: {e}"));
                return None;
            }
        };
        if !self.call(service, &bytes, self.default_timeout_usec) {
            return None;
        }
        let response = self.wait_response_for(service)?;
        match decode::<ResponsePacket<Resp>>(&response.packet) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                self.set_error(format!("decoding response from {service} failed: {e}"));
                None
            }
        }
    }

    /// Join the simulation under the configured identity.
    pub fn join(&self) -> bool {
        let Some(response) = self.invoke::<_, JoinResponse>(
            SERVICE_JOIN,
            JoinRequest {
                name: self.client_name.clone(),
            },
        ) else {
            return false;
        };
        if response.header.result_code != ResultCode::Ok {
            self.set_error(format!(
                "Join service returned an error: {}",
                response.body.message
            ));
            return false;
        }
        true
    }

    /// Fetch the engine's run state; readable through [`Client::sim_state`].
    pub fn get_sim_state(&self) -> bool {
        let Some(response) =
            self.invoke::<_, GetSimStateResponse>(SERVICE_GET_SIM_STATE, GetSimStateRequest)
        else {
            return false;
        };
        if response.header.result_code != ResultCode::Ok {
            self.set_error("GetSimState service returned an error");
            return false;
        }
        *self
            .last_sim_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(response.body);
        true
    }

    /// The most recent state snapshot collected by [`Client::get_sim_state`].
    pub fn sim_state(&self) -> Option<GetSimStateResponse> {
        self.last_sim_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ask the server to start, stop or reset the simulation.
    pub fn sim_control(&self, command: SimCommand) -> bool {
        let Some(response) = self.invoke::<_, SimControlResponse>(
            SERVICE_SIM_CONTROL,
            SimControlRequest {
                name: self.client_name.clone(),
                op: command.as_wire(),
            },
        ) else {
            return false;
        };
        if response.header.result_code != ResultCode::Ok {
            self.set_error(format!(
                "SimControl service returned an error: {}",
                response.body.message
            ));
            return false;
        }
        true
    }

    /// Fetch the next lifecycle event; readable through [`Client::event`].
    pub fn get_event(&self) -> bool {
        let Some(response) = self.invoke::<_, GetEventResponse>(
            SERVICE_GET_EVENT,
            GetEventRequest {
                name: self.client_name.clone(),
            },
        ) else {
            return false;
        };
        if response.header.result_code != ResultCode::Ok {
            self.set_error("GetEvent service returned an error");
            return false;
        }
        *self
            .last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = response.body.event_code;
        true
    }

    /// The most recent event collected by [`Client::get_event`].
    pub fn event(&self) -> AssetEvent {
        *self
            .last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Acknowledge a lifecycle transition back to the server.
    pub fn ack_event(&self, event: AssetEvent, succeeded: bool) -> bool {
        let Some(response) = self.invoke::<_, AckEventResponse>(
            SERVICE_ACK_EVENT,
            AckEventRequest {
                name: self.client_name.clone(),
                event_code: event.as_wire(),
                result_code: u32::from(!succeeded),
            },
        ) else {
            return false;
        };
        if response.header.result_code != ResultCode::Ok {
            self.set_error("AckEvent service returned an error");
            return false;
        }
        true
    }
}
