//! Service handlers.
//!
//! One handler per service name, registered once at startup. A handler
//! owns a cooperative cancellation flag and always produces exactly one
//! reply per request: identity mismatch, body decode failure and engine
//! failure all become non-OK result codes, never silence. The dispatch
//! engine resets the cancellation flag after every `handle` return.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::codec::{decode, encode_vec, PduCodec};
use crate::context::ServerContext;
use crate::engine::SimulationEngine;
use crate::error::Result;
use crate::message::{
    AckEventRequest, AckEventResponse, AssetEvent, GetEventRequest, GetEventResponse,
    GetSimStateRequest, GetSimStateResponse, JoinRequest, JoinResponse, RequestPacket,
    ResponsePacket, ResultCode, ServiceRequestHeader, ServiceStatus, SimCommand,
    SimControlRequest, SimControlResponse, SimState, SERVICE_ACK_EVENT, SERVICE_GET_EVENT,
    SERVICE_GET_SIM_STATE, SERVICE_JOIN, SERVICE_SIM_CONTROL,
};
use crate::transport::{RpcRequest, ServerEndpoint};

/// Cooperative cancellation flag, settable from any thread.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One registered service.
pub trait ServiceHandler: Send + Sync {
    /// The service name this handler answers for.
    fn service_name(&self) -> &'static str;

    /// Process one request and send exactly one reply through `endpoint`.
    ///
    /// The returned error covers transport failures only; every
    /// protocol-level failure is reported to the peer as a result code.
    fn handle(
        &self,
        ctx: &ServerContext,
        engine: &dyn SimulationEngine,
        endpoint: &dyn ServerEndpoint,
        request: &RpcRequest,
    ) -> Result<()>;

    /// Request cancellation of the in-flight `handle`, if any.
    fn cancel(&self);

    /// Whether cancellation has been requested.
    fn is_canceled(&self) -> bool;

    /// Clear the cancellation flag. Called by the dispatch engine after
    /// every `handle` return.
    fn reset_canceled(&self);
}

fn send_reply<B: PduCodec>(
    endpoint: &dyn ServerEndpoint,
    request: &ServiceRequestHeader,
    result: ResultCode,
    body: B,
) -> Result<()> {
    let response = ResponsePacket {
        header: crate::message::ServiceResponseHeader::reply_to(
            request,
            ServiceStatus::Done,
            result,
        ),
        body,
    };
    let bytes = encode_vec(&response)?;
    debug!(
        service = %request.service_name,
        request_id = request.request_id,
        result = ?result,
        "reply"
    );
    endpoint.reply(&response.header, &bytes)
}

fn join_reply(
    endpoint: &dyn ServerEndpoint,
    request: &ServiceRequestHeader,
    result: ResultCode,
    message: &str,
) -> Result<()> {
    send_reply(
        endpoint,
        request,
        result,
        JoinResponse {
            status_code: result.as_wire() as u32,
            message: message.to_owned(),
        },
    )
}

fn control_reply(
    endpoint: &dyn ServerEndpoint,
    request: &ServiceRequestHeader,
    result: ResultCode,
    message: &str,
) -> Result<()> {
    send_reply(
        endpoint,
        request,
        result,
        SimControlResponse {
            status_code: result.as_wire() as u32,
            message: message.to_owned(),
        },
    )
}

// Error replies for services whose response body carries no message field:
// the diagnosis travels in the header result code and the body stays
// zero-valued so it still decodes under the service's own schema.
fn empty_state_body() -> GetSimStateResponse {
    GetSimStateResponse {
        sim_state: SimState::Stopped,
        master_time: 0,
        is_pdu_created: false,
        is_simulation_mode: false,
        is_pdu_sync_mode: false,
    }
}

/// Handles `SimLink/Join`: admits the configured client exactly once and
/// registers it with the engine.
#[derive(Default)]
pub struct JoinHandler {
    cancel: CancelFlag,
}

impl ServiceHandler for JoinHandler {
    fn service_name(&self) -> &'static str {
        SERVICE_JOIN
    }

    fn handle(
        &self,
        ctx: &ServerContext,
        engine: &dyn SimulationEngine,
        endpoint: &dyn ServerEndpoint,
        request: &RpcRequest,
    ) -> Result<()> {
        let header = &request.header;
        if !ctx.matches_client(&header.client_name) {
            return join_reply(
                endpoint,
                header,
                ResultCode::Invalid,
                "Client node ID mismatch.",
            );
        }
        let body = match decode::<RequestPacket<JoinRequest>>(&request.packet) {
            Ok(packet) => packet.body,
            Err(_) => {
                return join_reply(
                    endpoint,
                    header,
                    ResultCode::Invalid,
                    "Invalid join request body.",
                );
            }
        };
        if !ctx.try_begin_join() {
            return join_reply(
                endpoint,
                header,
                ResultCode::Error,
                "Server service is not ready.",
            );
        }
        if !engine.register_asset(&body.name) {
            return join_reply(
                endpoint,
                header,
                ResultCode::Error,
                "Asset registration failed.",
            );
        }
        join_reply(endpoint, header, ResultCode::Ok, "Join accepted.")
    }

    fn cancel(&self) {
        self.cancel.set();
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_set()
    }

    fn reset_canceled(&self) {
        self.cancel.reset();
    }
}

/// Handles `SimLink/GetSimState`.
#[derive(Default)]
pub struct GetSimStateHandler {
    cancel: CancelFlag,
}

impl ServiceHandler for GetSimStateHandler {
    fn service_name(&self) -> &'static str {
        SERVICE_GET_SIM_STATE
    }

    fn handle(
        &self,
        ctx: &ServerContext,
        engine: &dyn SimulationEngine,
        endpoint: &dyn ServerEndpoint,
        request: &RpcRequest,
    ) -> Result<()> {
        let header = &request.header;
        if !ctx.matches_client(&header.client_name) {
            return send_reply(endpoint, header, ResultCode::Invalid, empty_state_body());
        }
        if decode::<RequestPacket<GetSimStateRequest>>(&request.packet).is_err() {
            return send_reply(endpoint, header, ResultCode::Invalid, empty_state_body());
        }
        let info = engine.state(&header.client_name);
        send_reply(
            endpoint,
            header,
            ResultCode::Ok,
            GetSimStateResponse {
                sim_state: info.state,
                master_time: info.world_time_usec,
                is_pdu_created: info.pdu_created,
                is_simulation_mode: info.simulation_mode,
                is_pdu_sync_mode: info.pdu_sync_mode,
            },
        )
    }

    fn cancel(&self) {
        self.cancel.set();
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_set()
    }

    fn reset_canceled(&self) {
        self.cancel.reset();
    }
}

/// Handles `SimLink/SimControl`: validates the operation code before
/// touching the engine.
#[derive(Default)]
pub struct SimControlHandler {
    cancel: CancelFlag,
}

impl ServiceHandler for SimControlHandler {
    fn service_name(&self) -> &'static str {
        SERVICE_SIM_CONTROL
    }

    fn handle(
        &self,
        ctx: &ServerContext,
        engine: &dyn SimulationEngine,
        endpoint: &dyn ServerEndpoint,
        request: &RpcRequest,
    ) -> Result<()> {
        let header = &request.header;
        if !ctx.matches_client(&header.client_name) {
            return control_reply(
                endpoint,
                header,
                ResultCode::Invalid,
                "Client node ID mismatch.",
            );
        }
        let body = match decode::<RequestPacket<SimControlRequest>>(&request.packet) {
            Ok(packet) => packet.body,
            Err(_) => {
                return control_reply(
                    endpoint,
                    header,
                    ResultCode::Invalid,
                    "Invalid request body.",
                );
            }
        };
        let op = match SimCommand::from_wire(body.op) {
            Ok(op) => op,
            Err(_) => {
                return control_reply(
                    endpoint,
                    header,
                    ResultCode::Invalid,
                    "Unknown simulation operation.",
                );
            }
        };
        let ok = match op {
            SimCommand::Start => engine.start(),
            SimCommand::Stop => engine.stop(),
            SimCommand::Reset => engine.reset(),
        };
        let (result, message) = if ok {
            (ResultCode::Ok, "Operation accepted.")
        } else {
            (ResultCode::Error, "Simulation operation failed.")
        };
        control_reply(endpoint, header, result, message)
    }

    fn cancel(&self) {
        self.cancel.set();
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_set()
    }

    fn reset_canceled(&self) {
        self.cancel.reset();
    }
}

/// Handles `SimLink/GetEvent`.
#[derive(Default)]
pub struct GetEventHandler {
    cancel: CancelFlag,
}

impl ServiceHandler for GetEventHandler {
    fn service_name(&self) -> &'static str {
        SERVICE_GET_EVENT
    }

    fn handle(
        &self,
        ctx: &ServerContext,
        engine: &dyn SimulationEngine,
        endpoint: &dyn ServerEndpoint,
        request: &RpcRequest,
    ) -> Result<()> {
        let header = &request.header;
        if !ctx.matches_client(&header.client_name) {
            return send_reply(
                endpoint,
                header,
                ResultCode::Invalid,
                GetEventResponse {
                    event_code: AssetEvent::None,
                },
            );
        }
        let body = match decode::<RequestPacket<GetEventRequest>>(&request.packet) {
            Ok(packet) => packet.body,
            Err(_) => {
                return send_reply(
                    endpoint,
                    header,
                    ResultCode::Invalid,
                    GetEventResponse {
                        event_code: AssetEvent::None,
                    },
                );
            }
        };
        let event = engine.fetch_event(&body.name);
        send_reply(
            endpoint,
            header,
            ResultCode::Ok,
            GetEventResponse { event_code: event },
        )
    }

    fn cancel(&self) {
        self.cancel.set();
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_set()
    }

    fn reset_canceled(&self) {
        self.cancel.reset();
    }
}

/// Handles `SimLink/AckEvent`: feeds the asset's transition acknowledgement
/// back to the engine, dispatched on the acknowledged event code.
#[derive(Default)]
pub struct AckEventHandler {
    cancel: CancelFlag,
}

impl ServiceHandler for AckEventHandler {
    fn service_name(&self) -> &'static str {
        SERVICE_ACK_EVENT
    }

    fn handle(
        &self,
        ctx: &ServerContext,
        engine: &dyn SimulationEngine,
        endpoint: &dyn ServerEndpoint,
        request: &RpcRequest,
    ) -> Result<()> {
        let header = &request.header;
        if !ctx.matches_client(&header.client_name) {
            return send_reply(
                endpoint,
                header,
                ResultCode::Invalid,
                AckEventResponse { event_code: 0 },
            );
        }
        let body = match decode::<RequestPacket<AckEventRequest>>(&request.packet) {
            Ok(packet) => packet.body,
            Err(_) => {
                return send_reply(
                    endpoint,
                    header,
                    ResultCode::Invalid,
                    AckEventResponse { event_code: 0 },
                );
            }
        };
        let acked = match AssetEvent::from_wire(body.event_code) {
            Ok(AssetEvent::Start) => Some(engine.ack_start(&body.name)),
            Ok(AssetEvent::Stop) => Some(engine.ack_stop(&body.name)),
            Ok(AssetEvent::Reset) => Some(engine.ack_reset(&body.name)),
            // None and Error are not acknowledgeable transitions
            Ok(_) | Err(_) => None,
        };
        let result = match acked {
            Some(true) => ResultCode::Ok,
            Some(false) => ResultCode::Error,
            None => ResultCode::Invalid,
        };
        send_reply(
            endpoint,
            header,
            result,
            AckEventResponse {
                event_code: body.event_code,
            },
        )
    }

    fn cancel(&self) {
        self.cancel.set();
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_set()
    }

    fn reset_canceled(&self) {
        self.cancel.reset();
    }
}
