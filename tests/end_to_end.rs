//! Full client/server scenarios over the loopback transport.

use std::sync::Arc;

use simlink::codec::{decode, encode_vec};
use simlink::engine::{InMemoryEngine, SimulationEngine};
use simlink::message::{
    AssetEvent, JoinRequest, JoinResponse, RequestPacket, ResponsePacket, ResultCode,
    ServiceRequestHeader, SimCommand, SimControlRequest, SimControlResponse, SimState,
    SERVICE_JOIN, SERVICE_SIM_CONTROL,
};
use simlink::timesrc::RealTimeSource;
use simlink::{Client, RemoteConfig, Server};

fn config() -> RemoteConfig {
    RemoteConfig::from_json(
        r#"{
            "client": { "nodeId": "asset-1" },
            "server": { "nodeId": "sim-server" },
            "delta_time_usec": 200,
            "max_delay_usec": 2000000
        }"#,
    )
    .unwrap()
}

struct Harness {
    server: Server,
    client: Client,
    engine: Arc<InMemoryEngine>,
}

fn start_harness() -> Harness {
    let config = config();
    let (server_ep, client_ep) = simlink::loopback::pair();
    let engine = Arc::new(InMemoryEngine::new());
    let mut server = Server::initialize(
        &config,
        Arc::clone(&engine) as Arc<dyn SimulationEngine>,
        Arc::new(server_ep),
        Arc::new(RealTimeSource::new()),
    )
    .unwrap();
    assert!(server.start());
    let client = Client::initialize(&config, "asset-1", Arc::new(client_ep)).unwrap();
    Harness {
        server,
        client,
        engine,
    }
}

fn raw_request<B: simlink::PduCodec>(
    service: &str,
    client_name: &str,
    body: B,
) -> (ServiceRequestHeader, Vec<u8>) {
    let header = ServiceRequestHeader {
        request_id: 99,
        service_name: service.to_owned(),
        client_name: client_name.to_owned(),
        opcode: 0,
        poll_interval_msec: 0,
    };
    let bytes = encode_vec(&RequestPacket {
        header: header.clone(),
        body,
    })
    .unwrap();
    (header, bytes)
}

#[test]
fn join_succeeds_once_and_registers_once() {
    let mut h = start_harness();

    assert!(h.client.join());
    assert_eq!(h.engine.register_count(), 1);
    assert!(h.engine.is_registered("asset-1"));

    // the join transition is one-shot: a second join is refused and the
    // asset is not registered again
    assert!(!h.client.join());
    assert!(h
        .client
        .last_error()
        .contains("Server service is not ready."));
    assert_eq!(h.engine.register_count(), 1);

    assert!(h.server.stop());
}

#[test]
fn mismatched_identity_is_refused_without_side_effects() {
    let mut h = start_harness();

    let (_, bytes) = raw_request(
        SERVICE_JOIN,
        "asset-X",
        JoinRequest {
            name: "asset-X".into(),
        },
    );
    assert!(h.client.call(SERVICE_JOIN, &bytes, 2_000_000));
    let response = h.client.wait_response_for(SERVICE_JOIN).unwrap();
    let decoded: ResponsePacket<JoinResponse> = decode(&response.packet).unwrap();
    assert_eq!(decoded.header.result_code, ResultCode::Invalid);
    assert_eq!(decoded.body.message, "Client node ID mismatch.");
    assert_eq!(h.engine.register_count(), 0);

    // the refusal left the context untouched: the real client still joins
    assert!(h.client.join());
    assert_eq!(h.engine.register_count(), 1);

    assert!(h.server.stop());
}

#[test]
fn out_of_range_control_op_leaves_state_untouched() {
    let mut h = start_harness();
    assert!(h.client.join());

    let (_, bytes) = raw_request(
        SERVICE_SIM_CONTROL,
        "asset-1",
        SimControlRequest {
            name: "asset-1".into(),
            op: 7,
        },
    );
    assert!(h.client.call(SERVICE_SIM_CONTROL, &bytes, 2_000_000));
    let response = h.client.wait_response_for(SERVICE_SIM_CONTROL).unwrap();
    let decoded: ResponsePacket<SimControlResponse> = decode(&response.packet).unwrap();
    assert_eq!(decoded.header.result_code, ResultCode::Invalid);
    assert_eq!(h.engine.state("asset-1").state, SimState::Stopped);

    assert!(h.server.stop());
}

#[test]
fn timeout_without_server_fails_fast() {
    let config = config();
    let (_server_ep, client_ep) = simlink::loopback::pair();
    let client = Client::initialize(&config, "asset-1", Arc::new(client_ep)).unwrap();

    let (_, bytes) = raw_request(
        SERVICE_JOIN,
        "asset-1",
        JoinRequest {
            name: "asset-1".into(),
        },
    );
    assert!(client.call(SERVICE_JOIN, &bytes, 20_000));
    assert!(client.wait_response_for(SERVICE_JOIN).is_none());
    assert!(client.last_error().contains("timed out"));
}

#[test]
fn full_asset_lifecycle() {
    let mut h = start_harness();

    assert!(h.client.join());

    assert!(h.client.get_sim_state());
    assert_eq!(h.client.sim_state().unwrap().sim_state, SimState::Stopped);

    assert!(h.client.sim_control(SimCommand::Start));
    assert!(h.client.get_sim_state());
    assert_eq!(h.client.sim_state().unwrap().sim_state, SimState::Running);

    h.engine.push_event("asset-1", AssetEvent::Start);
    assert!(h.client.get_event());
    assert_eq!(h.client.event(), AssetEvent::Start);
    assert!(h.client.ack_event(AssetEvent::Start, true));

    // drained queue reports None
    assert!(h.client.get_event());
    assert_eq!(h.client.event(), AssetEvent::None);

    assert!(h.client.sim_control(SimCommand::Stop));
    assert!(h.client.get_sim_state());
    assert_eq!(h.client.sim_state().unwrap().sim_state, SimState::Stopped);

    assert!(h.server.stop());
}

#[test]
fn stopping_simulation_that_never_ran_reports_error() {
    let mut h = start_harness();
    assert!(h.client.join());

    assert!(!h.client.sim_control(SimCommand::Stop));
    assert!(h
        .client
        .last_error()
        .contains("SimControl service returned an error"));

    assert!(h.server.stop());
}
