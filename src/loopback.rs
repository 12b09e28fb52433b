//! In-memory endpoint pair.
//!
//! Connects one client and one server inside a process through shared
//! queues. Used by the tests and the demo binary; a real deployment plugs
//! its own endpoints into the same traits.
//!
//! Timeout detection lives on the client side: `send_request` arms a
//! deadline per service, and `poll` surfaces a timeout event for any armed
//! service whose deadline passed before a response arrived.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::message::{peek_request_header, peek_response_header, ServiceResponseHeader};
use crate::transport::{
    ClientEndpoint, ClientEvent, RpcRequest, RpcResponse, ServerEndpoint, ServerEvent,
};

#[derive(Debug, Default)]
struct Queues {
    requests: VecDeque<Vec<u8>>,
    cancels: VecDeque<String>,
    responses: VecDeque<Vec<u8>>,
    // (service, deadline) for requests sent with a positive timeout
    deadlines: Vec<(String, Instant)>,
}

#[derive(Debug, Default)]
struct Shared {
    queues: Mutex<Queues>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Server half of a loopback pair.
pub struct LoopbackServerEndpoint {
    shared: Arc<Shared>,
}

/// Client half of a loopback pair.
pub struct LoopbackClientEndpoint {
    shared: Arc<Shared>,
}

/// Create a connected endpoint pair.
pub fn pair() -> (LoopbackServerEndpoint, LoopbackClientEndpoint) {
    let shared = Arc::new(Shared::default());
    (
        LoopbackServerEndpoint {
            shared: Arc::clone(&shared),
        },
        LoopbackClientEndpoint { shared },
    )
}

impl ServerEndpoint for LoopbackServerEndpoint {
    fn poll(&self) -> Result<ServerEvent> {
        let mut q = self.shared.lock();
        if let Some(service) = q.cancels.pop_front() {
            return Ok(ServerEvent::RequestCancel(service));
        }
        if let Some(packet) = q.requests.pop_front() {
            drop(q);
            let header = peek_request_header(&packet)?;
            return Ok(ServerEvent::RequestIn(RpcRequest { header, packet }));
        }
        Ok(ServerEvent::None)
    }

    fn reply(&self, header: &ServiceResponseHeader, packet: &[u8]) -> Result<()> {
        if packet.is_empty() {
            return Err(Error::Transport(format!(
                "empty reply for service {}",
                header.service_name
            )));
        }
        self.shared.lock().responses.push_back(packet.to_vec());
        Ok(())
    }
}

impl LoopbackClientEndpoint {
    /// Inject a cancel request for a service, as a transport-level peer
    /// would.
    pub fn cancel(&self, service: &str) {
        self.shared.lock().cancels.push_back(service.to_owned());
    }
}

impl ClientEndpoint for LoopbackClientEndpoint {
    fn send_request(
        &self,
        header: &crate::message::ServiceRequestHeader,
        packet: &[u8],
        timeout_usec: i64,
    ) -> Result<()> {
        let mut q = self.shared.lock();
        q.requests.push_back(packet.to_vec());
        if timeout_usec > 0 {
            let deadline = Instant::now() + Duration::from_micros(timeout_usec as u64);
            q.deadlines.push((header.service_name.clone(), deadline));
        }
        Ok(())
    }

    fn poll(&self) -> Result<ClientEvent> {
        let mut q = self.shared.lock();
        if let Some(packet) = q.responses.pop_front() {
            drop(q);
            let header = peek_response_header(&packet)?;
            let mut q = self.shared.lock();
            q.deadlines.retain(|(s, _)| *s != header.service_name);
            return Ok(ClientEvent::ResponseIn(RpcResponse { header, packet }));
        }
        let now = Instant::now();
        if let Some(pos) = q.deadlines.iter().position(|(_, d)| *d <= now) {
            let (service, _) = q.deadlines.swap_remove(pos);
            return Ok(ClientEvent::ResponseTimeout(service));
        }
        Ok(ClientEvent::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_vec;
    use crate::message::{
        JoinRequest, JoinResponse, RequestPacket, ResponsePacket, ResultCode,
        ServiceRequestHeader, ServiceStatus, SERVICE_JOIN,
    };

    fn join_packet() -> (ServiceRequestHeader, Vec<u8>) {
        let header = ServiceRequestHeader {
            request_id: 1,
            service_name: SERVICE_JOIN.to_owned(),
            client_name: "asset-1".to_owned(),
            opcode: 0,
            poll_interval_msec: 0,
        };
        let packet = RequestPacket {
            header: header.clone(),
            body: JoinRequest {
                name: "asset-1".into(),
            },
        };
        (header, encode_vec(&packet).unwrap())
    }

    #[test]
    fn request_travels_client_to_server() {
        let (server, client) = pair();
        let (header, bytes) = join_packet();
        client.send_request(&header, &bytes, 0).unwrap();

        match server.poll().unwrap() {
            ServerEvent::RequestIn(req) => {
                assert_eq!(req.header.service_name, SERVICE_JOIN);
                assert_eq!(req.packet, bytes);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(server.poll().unwrap(), ServerEvent::None));
    }

    #[test]
    fn response_travels_server_to_client() {
        let (server, client) = pair();
        let (req_header, _) = join_packet();
        let response = ResponsePacket {
            header: ServiceResponseHeader::reply_to(
                &req_header,
                ServiceStatus::Done,
                ResultCode::Ok,
            ),
            body: JoinResponse {
                status_code: 0,
                message: "ok".into(),
            },
        };
        let bytes = encode_vec(&response).unwrap();
        server.reply(&response.header, &bytes).unwrap();

        match client.poll().unwrap() {
            ClientEvent::ResponseIn(resp) => {
                assert_eq!(resp.header.service_name, SERVICE_JOIN);
                assert_eq!(resp.header.result_code, ResultCode::Ok);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn expired_deadline_surfaces_timeout() {
        let (_server, client) = pair();
        let (header, bytes) = join_packet();
        client.send_request(&header, &bytes, 1).unwrap();
        std::thread::sleep(Duration::from_millis(2));

        match client.poll().unwrap() {
            ClientEvent::ResponseTimeout(service) => assert_eq!(service, SERVICE_JOIN),
            other => panic!("unexpected event: {other:?}"),
        }
        // one-shot: the timeout is reported once
        assert!(matches!(client.poll().unwrap(), ClientEvent::None));
    }

    #[test]
    fn cancel_arrives_before_queued_requests() {
        let (server, client) = pair();
        let (header, bytes) = join_packet();
        client.send_request(&header, &bytes, 0).unwrap();
        client.cancel(SERVICE_JOIN);

        assert!(matches!(
            server.poll().unwrap(),
            ServerEvent::RequestCancel(s) if s == SERVICE_JOIN
        ));
        assert!(matches!(server.poll().unwrap(), ServerEvent::RequestIn(_)));
    }
}
