//! Message schemas for the five simulation services.
//!
//! Every request/response travels as one packet: a correlation header
//! followed by a service-specific body, both in the PDU fixed region. The
//! field layouts here are the wire contract; compatibility requires the
//! same field order, primitive widths and string capacities on both ends.

use crate::alloc::DynamicAllocator;
use crate::codec::{FixedReader, FixedWriter, PduCodec};
use crate::container::PduContainer;
use crate::error::{Error, Result};

/// Fixed capacity of every string field, including the NUL terminator.
pub const STRING_CAPACITY: usize = 128;

/// Service name for the Join operation.
pub const SERVICE_JOIN: &str = "SimLink/Join";
/// Service name for the GetSimState operation.
pub const SERVICE_GET_SIM_STATE: &str = "SimLink/GetSimState";
/// Service name for the SimControl operation.
pub const SERVICE_SIM_CONTROL: &str = "SimLink/SimControl";
/// Service name for the GetEvent operation.
pub const SERVICE_GET_EVENT: &str = "SimLink/GetEvent";
/// Service name for the AckEvent operation.
pub const SERVICE_ACK_EVENT: &str = "SimLink/AckEvent";

/// Outcome taxonomy carried in every response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Operation succeeded.
    Ok,
    /// Operation failed (engine or server-side error).
    Error,
    /// Request was invalid (bad identity, bad body, bad operation code).
    Invalid,
}

impl ResultCode {
    /// Wire representation.
    #[inline]
    pub fn as_wire(self) -> i32 {
        match self {
            ResultCode::Ok => 0,
            ResultCode::Error => 1,
            ResultCode::Invalid => 2,
        }
    }

    /// Parse from the wire representation.
    pub fn from_wire(v: i32) -> Result<Self> {
        match v {
            0 => Ok(ResultCode::Ok),
            1 => Ok(ResultCode::Error),
            2 => Ok(ResultCode::Invalid),
            _ => Err(Error::InvalidValue {
                field: "result_code",
                value: v as i64,
            }),
        }
    }
}

/// Processing status carried in every response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Request accepted, still being processed.
    Pending,
    /// Processing finished; the result code is final.
    Done,
}

impl ServiceStatus {
    #[inline]
    pub fn as_wire(self) -> u32 {
        match self {
            ServiceStatus::Pending => 0,
            ServiceStatus::Done => 1,
        }
    }

    pub fn from_wire(v: u32) -> Result<Self> {
        match v {
            0 => Ok(ServiceStatus::Pending),
            1 => Ok(ServiceStatus::Done),
            _ => Err(Error::InvalidValue {
                field: "status",
                value: v as i64,
            }),
        }
    }
}

/// Run state of the simulation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Stopped,
    Runnable,
    Running,
    Stopping,
    Resetting,
    Error,
    Terminated,
    Any,
}

impl SimState {
    #[inline]
    pub fn as_wire(self) -> u32 {
        match self {
            SimState::Stopped => 0,
            SimState::Runnable => 1,
            SimState::Running => 2,
            SimState::Stopping => 3,
            SimState::Resetting => 4,
            SimState::Error => 5,
            SimState::Terminated => 6,
            SimState::Any => 7,
        }
    }

    pub fn from_wire(v: u32) -> Result<Self> {
        match v {
            0 => Ok(SimState::Stopped),
            1 => Ok(SimState::Runnable),
            2 => Ok(SimState::Running),
            3 => Ok(SimState::Stopping),
            4 => Ok(SimState::Resetting),
            5 => Ok(SimState::Error),
            6 => Ok(SimState::Terminated),
            7 => Ok(SimState::Any),
            _ => Err(Error::InvalidValue {
                field: "sim_state",
                value: v as i64,
            }),
        }
    }
}

/// Control operation requested through SimControl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    Start,
    Stop,
    Reset,
}

impl SimCommand {
    #[inline]
    pub fn as_wire(self) -> u32 {
        match self {
            SimCommand::Start => 0,
            SimCommand::Stop => 1,
            SimCommand::Reset => 2,
        }
    }

    pub fn from_wire(v: u32) -> Result<Self> {
        match v {
            0 => Ok(SimCommand::Start),
            1 => Ok(SimCommand::Stop),
            2 => Ok(SimCommand::Reset),
            _ => Err(Error::InvalidValue {
                field: "op",
                value: v as i64,
            }),
        }
    }
}

/// Lifecycle event delivered to an asset through GetEvent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetEvent {
    None,
    Start,
    Stop,
    Reset,
    Error,
}

impl AssetEvent {
    #[inline]
    pub fn as_wire(self) -> u32 {
        match self {
            AssetEvent::None => 0,
            AssetEvent::Start => 1,
            AssetEvent::Stop => 2,
            AssetEvent::Reset => 3,
            AssetEvent::Error => 4,
        }
    }

    pub fn from_wire(v: u32) -> Result<Self> {
        match v {
            0 => Ok(AssetEvent::None),
            1 => Ok(AssetEvent::Start),
            2 => Ok(AssetEvent::Stop),
            3 => Ok(AssetEvent::Reset),
            4 => Ok(AssetEvent::Error),
            _ => Err(Error::InvalidValue {
                field: "event_code",
                value: v as i64,
            }),
        }
    }
}

/// Correlation metadata at the head of every request packet.
///
/// Fixed layout (268 bytes): request_id (4), service_name (128),
/// client_name (128), opcode (4), poll_interval_msec (4).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceRequestHeader {
    pub request_id: u32,
    pub service_name: String,
    pub client_name: String,
    pub opcode: u32,
    pub poll_interval_msec: u32,
}

impl PduCodec for ServiceRequestHeader {
    const FIXED_SIZE: usize = 4 + STRING_CAPACITY + STRING_CAPACITY + 4 + 4;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_u32(self.request_id)?;
        w.put_str(&self.service_name, STRING_CAPACITY)?;
        w.put_str(&self.client_name, STRING_CAPACITY)?;
        w.put_u32(self.opcode)?;
        w.put_u32(self.poll_interval_msec)
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            request_id: r.get_u32()?,
            service_name: r.get_str(STRING_CAPACITY)?,
            client_name: r.get_str(STRING_CAPACITY)?,
            opcode: r.get_u32()?,
            poll_interval_msec: r.get_u32()?,
        })
    }
}

/// Correlation metadata at the head of every response packet.
///
/// Fixed layout (272 bytes): request_id (4), service_name (128),
/// client_name (128), status (4), processed_percentage (4),
/// result_code (4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponseHeader {
    pub request_id: u32,
    pub service_name: String,
    pub client_name: String,
    pub status: ServiceStatus,
    pub processed_percentage: i32,
    pub result_code: ResultCode,
}

impl ServiceResponseHeader {
    /// Build a response header echoing a request's correlation fields.
    pub fn reply_to(request: &ServiceRequestHeader, status: ServiceStatus, result: ResultCode) -> Self {
        Self {
            request_id: request.request_id,
            service_name: request.service_name.clone(),
            client_name: request.client_name.clone(),
            status,
            processed_percentage: 100,
            result_code: result,
        }
    }
}

impl PduCodec for ServiceResponseHeader {
    const FIXED_SIZE: usize = 4 + STRING_CAPACITY + STRING_CAPACITY + 4 + 4 + 4;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_u32(self.request_id)?;
        w.put_str(&self.service_name, STRING_CAPACITY)?;
        w.put_str(&self.client_name, STRING_CAPACITY)?;
        w.put_u32(self.status.as_wire())?;
        w.put_i32(self.processed_percentage)?;
        w.put_i32(self.result_code.as_wire())
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            request_id: r.get_u32()?,
            service_name: r.get_str(STRING_CAPACITY)?,
            client_name: r.get_str(STRING_CAPACITY)?,
            status: ServiceStatus::from_wire(r.get_u32()?)?,
            processed_percentage: r.get_i32()?,
            result_code: ResultCode::from_wire(r.get_i32()?)?,
        })
    }
}

/// A full request packet: header followed by a typed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPacket<B> {
    pub header: ServiceRequestHeader,
    pub body: B,
}

impl<B: PduCodec> PduCodec for RequestPacket<B> {
    const FIXED_SIZE: usize = ServiceRequestHeader::FIXED_SIZE + B::FIXED_SIZE;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, heap: &mut DynamicAllocator) -> Result<()> {
        self.header.write_fixed(w, heap)?;
        self.body.write_fixed(w, heap)
    }

    fn read_fixed(r: &mut FixedReader<'_>, heap: &[u8]) -> Result<Self> {
        Ok(Self {
            header: ServiceRequestHeader::read_fixed(r, heap)?,
            body: B::read_fixed(r, heap)?,
        })
    }
}

/// A full response packet: header followed by a typed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePacket<B> {
    pub header: ServiceResponseHeader,
    pub body: B,
}

impl<B: PduCodec> PduCodec for ResponsePacket<B> {
    const FIXED_SIZE: usize = ServiceResponseHeader::FIXED_SIZE + B::FIXED_SIZE;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, heap: &mut DynamicAllocator) -> Result<()> {
        self.header.write_fixed(w, heap)?;
        self.body.write_fixed(w, heap)
    }

    fn read_fixed(r: &mut FixedReader<'_>, heap: &[u8]) -> Result<Self> {
        Ok(Self {
            header: ServiceResponseHeader::read_fixed(r, heap)?,
            body: B::read_fixed(r, heap)?,
        })
    }
}

/// Read only the request header from a full request packet.
///
/// The header sits at offset zero of the fixed region, so endpoints can
/// correlate without knowing the body schema.
pub fn peek_request_header(packet: &[u8]) -> Result<ServiceRequestHeader> {
    let container = PduContainer::from_bytes(packet)?;
    let heap = container.heap_view()?;
    let mut r = FixedReader::new(container.fixed());
    ServiceRequestHeader::read_fixed(&mut r, heap)
}

/// Read only the response header from a full response packet.
pub fn peek_response_header(packet: &[u8]) -> Result<ServiceResponseHeader> {
    let container = PduContainer::from_bytes(packet)?;
    let heap = container.heap_view()?;
    let mut r = FixedReader::new(container.fixed());
    ServiceResponseHeader::read_fixed(&mut r, heap)
}

// ============================================================================
// Service bodies
// ============================================================================

/// Join request body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinRequest {
    pub name: String,
}

impl PduCodec for JoinRequest {
    const FIXED_SIZE: usize = STRING_CAPACITY;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_str(&self.name, STRING_CAPACITY)
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            name: r.get_str(STRING_CAPACITY)?,
        })
    }
}

/// Join response body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinResponse {
    pub status_code: u32,
    pub message: String,
}

impl PduCodec for JoinResponse {
    const FIXED_SIZE: usize = 4 + STRING_CAPACITY;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_u32(self.status_code)?;
        w.put_str(&self.message, STRING_CAPACITY)
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            status_code: r.get_u32()?,
            message: r.get_str(STRING_CAPACITY)?,
        })
    }
}

/// GetSimState request body (empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetSimStateRequest;

impl PduCodec for GetSimStateRequest {
    const FIXED_SIZE: usize = 0;

    fn write_fixed(&self, _w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        Ok(())
    }

    fn read_fixed(_r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self)
    }
}

/// GetSimState response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetSimStateResponse {
    pub sim_state: SimState,
    pub master_time: i64,
    pub is_pdu_created: bool,
    pub is_simulation_mode: bool,
    pub is_pdu_sync_mode: bool,
}

impl PduCodec for GetSimStateResponse {
    const FIXED_SIZE: usize = 4 + 8 + 4 + 4 + 4;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_u32(self.sim_state.as_wire())?;
        w.put_i64(self.master_time)?;
        w.put_bool(self.is_pdu_created)?;
        w.put_bool(self.is_simulation_mode)?;
        w.put_bool(self.is_pdu_sync_mode)
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            sim_state: SimState::from_wire(r.get_u32()?)?,
            master_time: r.get_i64()?,
            is_pdu_created: r.get_bool()?,
            is_simulation_mode: r.get_bool()?,
            is_pdu_sync_mode: r.get_bool()?,
        })
    }
}

/// SimControl request body. `op` is raw on the wire so that servers can
/// reject out-of-range values with a typed result code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimControlRequest {
    pub name: String,
    pub op: u32,
}

impl PduCodec for SimControlRequest {
    const FIXED_SIZE: usize = STRING_CAPACITY + 4;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_str(&self.name, STRING_CAPACITY)?;
        w.put_u32(self.op)
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            name: r.get_str(STRING_CAPACITY)?,
            op: r.get_u32()?,
        })
    }
}

/// SimControl response body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimControlResponse {
    pub status_code: u32,
    pub message: String,
}

impl PduCodec for SimControlResponse {
    const FIXED_SIZE: usize = 4 + STRING_CAPACITY;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_u32(self.status_code)?;
        w.put_str(&self.message, STRING_CAPACITY)
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            status_code: r.get_u32()?,
            message: r.get_str(STRING_CAPACITY)?,
        })
    }
}

/// GetEvent request body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetEventRequest {
    pub name: String,
}

impl PduCodec for GetEventRequest {
    const FIXED_SIZE: usize = STRING_CAPACITY;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_str(&self.name, STRING_CAPACITY)
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            name: r.get_str(STRING_CAPACITY)?,
        })
    }
}

/// GetEvent response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetEventResponse {
    pub event_code: AssetEvent,
}

impl PduCodec for GetEventResponse {
    const FIXED_SIZE: usize = 4;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_u32(self.event_code.as_wire())
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            event_code: AssetEvent::from_wire(r.get_u32()?)?,
        })
    }
}

/// AckEvent request body. `event_code` is raw on the wire, like
/// [`SimControlRequest::op`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AckEventRequest {
    pub name: String,
    pub event_code: u32,
    pub result_code: u32,
}

impl PduCodec for AckEventRequest {
    const FIXED_SIZE: usize = STRING_CAPACITY + 4 + 4;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_str(&self.name, STRING_CAPACITY)?;
        w.put_u32(self.event_code)?;
        w.put_u32(self.result_code)
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            name: r.get_str(STRING_CAPACITY)?,
            event_code: r.get_u32()?,
            result_code: r.get_u32()?,
        })
    }
}

/// AckEvent response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckEventResponse {
    pub event_code: u32,
}

impl PduCodec for AckEventResponse {
    const FIXED_SIZE: usize = 4;

    fn write_fixed(&self, w: &mut FixedWriter<'_>, _heap: &mut DynamicAllocator) -> Result<()> {
        w.put_u32(self.event_code)
    }

    fn read_fixed(r: &mut FixedReader<'_>, _heap: &[u8]) -> Result<Self> {
        Ok(Self {
            event_code: r.get_u32()?,
        })
    }
}
