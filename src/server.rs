//! Server dispatch engine.
//!
//! One poll thread feeds the pending table from the transport, one worker
//! thread drains it through the registered handlers, and a conductor thread
//! advances engine time off the request path. The three start and stop
//! together.
//!
//! The pending table and its condvar share one lock. The server context has
//! its own independent lock and the two are never held at the same time, so
//! lock ordering cannot deadlock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, error, info, warn};

use crate::config::RemoteConfig;
use crate::context::ServerContext;
use crate::engine::SimulationEngine;
use crate::error::Result;
use crate::handler::{
    AckEventHandler, GetEventHandler, GetSimStateHandler, JoinHandler, ServiceHandler,
    SimControlHandler,
};
use crate::mailbox::Mailbox;
use crate::timesrc::TimeSource;
use crate::transport::{RpcRequest, ServerEndpoint, ServerEvent};

type HandlerMap = HashMap<&'static str, Arc<dyn ServiceHandler>>;

/// State shared between the poll and worker threads.
struct DispatchShared {
    mailbox: Mutex<Mailbox>,
    ready: Condvar,
    stop: AtomicBool,
}

impl DispatchShared {
    fn new() -> Self {
        Self {
            mailbox: Mutex::new(Mailbox::new()),
            ready: Condvar::new(),
            stop: AtomicBool::new(false),
        }
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Feed one transport event into the pending table.
///
/// Unregistered services and slot collisions drop the request here; neither
/// ever reaches the worker.
fn process_event(shared: &DispatchShared, handlers: &HandlerMap, event: ServerEvent) {
    match event {
        ServerEvent::None => {}
        ServerEvent::RequestIn(request) => {
            let service = request.header.service_name.clone();
            if !handlers.contains_key(service.as_str()) {
                error!(service = %service, "dropping request for unregistered service");
                return;
            }
            let mut mailbox = shared
                .mailbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if mailbox.try_insert(request) {
                debug!(service = %service, "request accepted");
                shared.ready.notify_one();
            } else {
                warn!(service = %service, "dropping request, previous one still in flight");
            }
        }
        ServerEvent::RequestCancel(service) => {
            // the pending entry stays; the flag is observed inside handle()
            match handlers.get(service.as_str()) {
                Some(handler) => {
                    let pending = shared
                        .mailbox
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .contains(&service);
                    if pending {
                        info!(service = %service, "cancel requested");
                        handler.cancel();
                    } else {
                        // a stale cancel must not taint the next request
                        info!(service = %service, "no pending request to cancel");
                    }
                }
                None => warn!(service = %service, "cancel for unregistered service ignored"),
            }
        }
    }
}

/// Block until a job is pending or stop is requested.
fn take_job(shared: &DispatchShared) -> Option<RpcRequest> {
    let mut mailbox = shared
        .mailbox
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    loop {
        if shared.stopping() {
            return None;
        }
        if let Some(job) = mailbox.next_job() {
            return Some(job);
        }
        mailbox = shared
            .ready
            .wait(mailbox)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Free the service's slot and clear its handler's cancellation flag.
fn finish_job(shared: &DispatchShared, handlers: &HandlerMap, service: &str) {
    let mut mailbox = shared
        .mailbox
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    mailbox.remove(service);
    if let Some(handler) = handlers.get(service) {
        handler.reset_canceled();
    }
}

/// The server: owns the dispatch threads and the handler table.
pub struct Server {
    shared: Arc<DispatchShared>,
    handlers: Arc<HandlerMap>,
    ctx: Arc<ServerContext>,
    engine: Arc<dyn SimulationEngine>,
    endpoint: Arc<dyn ServerEndpoint>,
    time: Arc<dyn TimeSource>,
    delta_usec: i64,
    threads: Vec<JoinHandle<()>>,
    started: bool,
    last_error: Mutex<String>,
}

impl Server {
    /// Build a server from configuration, registering the five service
    /// handlers.
    pub fn initialize(
        config: &RemoteConfig,
        engine: Arc<dyn SimulationEngine>,
        endpoint: Arc<dyn ServerEndpoint>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        let mut handlers: HandlerMap = HashMap::new();
        for handler in [
            Arc::new(JoinHandler::default()) as Arc<dyn ServiceHandler>,
            Arc::new(GetSimStateHandler::default()),
            Arc::new(SimControlHandler::default()),
            Arc::new(GetEventHandler::default()),
            Arc::new(AckEventHandler::default()),
        ] {
            handlers.insert(handler.service_name(), handler);
        }
        info!(
            server = %config.server.node_id,
            client = %config.client.node_id,
            services = handlers.len(),
            "server initialized"
        );
        Ok(Self {
            shared: Arc::new(DispatchShared::new()),
            handlers: Arc::new(handlers),
            ctx: Arc::new(ServerContext::new(config.client.node_id.clone())),
            engine,
            endpoint,
            time,
            delta_usec: config.delta_time_usec,
            threads: Vec::new(),
            started: false,
            last_error: Mutex::new(String::new()),
        })
    }

    /// The session context, shared with the handlers.
    #[inline]
    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    /// Whether the dispatch threads are running.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.started && !self.shared.stopping()
    }

    /// Last failure reported by `start`/`stop`.
    pub fn last_error(&self) -> String {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_error(&self, message: impl Into<String>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = message.into();
    }

    /// Start the poll, worker and conductor threads.
    pub fn start(&mut self) -> bool {
        if self.started {
            self.set_error("server already started");
            return false;
        }
        if self.shared.stopping() {
            self.set_error("server already stopped");
            return false;
        }

        let poll = {
            let shared = Arc::clone(&self.shared);
            let handlers = Arc::clone(&self.handlers);
            let endpoint = Arc::clone(&self.endpoint);
            let time = Arc::clone(&self.time);
            let delta = self.delta_usec;
            std::thread::spawn(move || {
                while !shared.stopping() {
                    match endpoint.poll() {
                        Ok(event) => process_event(&shared, &handlers, event),
                        Err(e) => error!(error = %e, "transport poll failed"),
                    }
                    time.sleep_usec(delta);
                }
                // guarantee the worker observes the stop flag
                shared.ready.notify_all();
            })
        };

        let worker = {
            let shared = Arc::clone(&self.shared);
            let handlers = Arc::clone(&self.handlers);
            let ctx = Arc::clone(&self.ctx);
            let engine = Arc::clone(&self.engine);
            let endpoint = Arc::clone(&self.endpoint);
            std::thread::spawn(move || {
                while let Some(job) = take_job(&shared) {
                    let service = job.header.service_name.clone();
                    match handlers.get(service.as_str()) {
                        Some(handler) => {
                            if let Err(e) = handler.handle(&ctx, engine.as_ref(), endpoint.as_ref(), &job)
                            {
                                error!(service = %service, error = %e, "handler reply failed");
                            }
                        }
                        None => error!(service = %service, "no handler for pending request"),
                    }
                    finish_job(&shared, &handlers, &service);
                }
            })
        };

        let conductor = {
            let shared = Arc::clone(&self.shared);
            let engine = Arc::clone(&self.engine);
            let time = Arc::clone(&self.time);
            let delta = self.delta_usec;
            std::thread::spawn(move || {
                while !shared.stopping() {
                    engine.advance(delta);
                    time.sleep_usec(delta);
                }
            })
        };

        self.threads = vec![poll, worker, conductor];
        self.started = true;
        info!("server started");
        true
    }

    /// Stop and join all dispatch threads. Idempotent.
    pub fn stop(&mut self) -> bool {
        if !self.started {
            return true;
        }
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.ready.notify_all();
        let threads = std::mem::take(&mut self.threads);
        for handle in threads {
            if handle.join().is_err() {
                self.set_error("a dispatch thread panicked");
                error!("a dispatch thread panicked during stop");
            }
        }
        self.started = false;
        info!("server stopped");
        true
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_vec;
    use crate::engine::InMemoryEngine;
    use crate::loopback;
    use crate::message::{
        JoinRequest, RequestPacket, ServiceRequestHeader, SERVICE_GET_EVENT, SERVICE_JOIN,
    };
    use crate::timesrc::RealTimeSource;

    fn config() -> RemoteConfig {
        RemoteConfig::from_json(
            r#"{
                "client": { "nodeId": "asset-1" },
                "server": { "nodeId": "sim-server" },
                "delta_time_usec": 200
            }"#,
        )
        .unwrap()
    }

    fn handlers() -> HandlerMap {
        let mut map: HandlerMap = HashMap::new();
        for handler in [
            Arc::new(JoinHandler::default()) as Arc<dyn ServiceHandler>,
            Arc::new(GetEventHandler::default()),
        ] {
            map.insert(handler.service_name(), handler);
        }
        map
    }

    fn join_request(id: u32) -> RpcRequest {
        let header = ServiceRequestHeader {
            request_id: id,
            service_name: SERVICE_JOIN.to_owned(),
            client_name: "asset-1".to_owned(),
            opcode: 0,
            poll_interval_msec: 0,
        };
        let packet = encode_vec(&RequestPacket {
            header: header.clone(),
            body: JoinRequest {
                name: "asset-1".into(),
            },
        })
        .unwrap();
        RpcRequest { header, packet }
    }

    #[test]
    fn request_in_fills_slot_once() {
        let shared = DispatchShared::new();
        let handlers = handlers();

        process_event(&shared, &handlers, ServerEvent::RequestIn(join_request(1)));
        process_event(&shared, &handlers, ServerEvent::RequestIn(join_request(2)));

        let mailbox = shared.mailbox.lock().unwrap();
        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox.next_job().unwrap().header.request_id, 1);
    }

    #[test]
    fn unregistered_service_never_enters_mailbox() {
        let shared = DispatchShared::new();
        let handlers = handlers();

        let mut request = join_request(1);
        request.header.service_name = "SimLink/Unknown".to_owned();
        process_event(&shared, &handlers, ServerEvent::RequestIn(request));

        assert!(shared.mailbox.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_sets_handler_flag_and_keeps_entry() {
        let shared = DispatchShared::new();
        let handlers = handlers();

        process_event(&shared, &handlers, ServerEvent::RequestIn(join_request(1)));
        process_event(
            &shared,
            &handlers,
            ServerEvent::RequestCancel(SERVICE_JOIN.to_owned()),
        );

        assert!(handlers[SERVICE_JOIN].is_canceled());
        assert_eq!(shared.mailbox.lock().unwrap().len(), 1);
        // cancel for a service that has no handler is ignored
        process_event(
            &shared,
            &handlers,
            ServerEvent::RequestCancel("SimLink/Unknown".to_owned()),
        );
    }

    #[test]
    fn cancel_without_pending_entry_leaves_flag_clear() {
        let shared = DispatchShared::new();
        let handlers = handlers();

        process_event(
            &shared,
            &handlers,
            ServerEvent::RequestCancel(SERVICE_JOIN.to_owned()),
        );
        assert!(!handlers[SERVICE_JOIN].is_canceled());

        // the next request for the service starts with a clean flag
        process_event(&shared, &handlers, ServerEvent::RequestIn(join_request(1)));
        assert!(!handlers[SERVICE_JOIN].is_canceled());
    }

    #[test]
    fn finish_job_frees_slot_and_resets_cancel() {
        let shared = DispatchShared::new();
        let handlers = handlers();

        process_event(&shared, &handlers, ServerEvent::RequestIn(join_request(1)));
        handlers[SERVICE_JOIN].cancel();

        finish_job(&shared, &handlers, SERVICE_JOIN);

        assert!(shared.mailbox.lock().unwrap().is_empty());
        assert!(!handlers[SERVICE_JOIN].is_canceled());
    }

    #[test]
    fn take_job_returns_pending_entry() {
        let shared = DispatchShared::new();
        let handlers = handlers();
        process_event(&shared, &handlers, ServerEvent::RequestIn(join_request(7)));
        let job = take_job(&shared).unwrap();
        assert_eq!(job.header.request_id, 7);
        // slot still occupied while the job is processed
        assert!(shared.mailbox.lock().unwrap().contains(SERVICE_JOIN));
    }

    #[test]
    fn take_job_unblocks_on_stop() {
        let shared = Arc::new(DispatchShared::new());
        let waiter = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || take_job(&shared))
        };
        std::thread::sleep(std::time::Duration::from_millis(10));
        shared.stop.store(true, Ordering::SeqCst);
        shared.ready.notify_all();
        assert!(waiter.join().unwrap().is_none());
    }

    #[test]
    fn distinct_services_queue_independently() {
        let shared = DispatchShared::new();
        let handlers = handlers();
        process_event(&shared, &handlers, ServerEvent::RequestIn(join_request(1)));
        let mut other = join_request(2);
        other.header.service_name = SERVICE_GET_EVENT.to_owned();
        process_event(&shared, &handlers, ServerEvent::RequestIn(other));
        assert_eq!(shared.mailbox.lock().unwrap().len(), 2);
    }

    #[test]
    fn stop_is_idempotent_and_start_once() {
        let (server_ep, _client_ep) = loopback::pair();
        let mut server = Server::initialize(
            &config(),
            Arc::new(InMemoryEngine::new()),
            Arc::new(server_ep),
            Arc::new(RealTimeSource::new()),
        )
        .unwrap();

        assert!(!server.is_running());
        assert!(server.start());
        assert!(server.is_running());
        assert!(!server.start());
        assert!(server.last_error().contains("already started"));

        assert!(server.stop());
        assert!(!server.is_running());
        assert!(server.stop());
        assert!(!server.start());
        assert!(server.last_error().contains("already stopped"));
    }
}
