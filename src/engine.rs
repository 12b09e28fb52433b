//! Simulation engine boundary.
//!
//! The dispatch engine treats the simulation itself as an injected
//! collaborator behind [`SimulationEngine`]. All calls are synchronous and
//! report success as `bool`; the RPC layer never retries on its own.
//! [`InMemoryEngine`] is a self-contained implementation for tests and the
//! demo.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::message::{AssetEvent, SimState};

/// Snapshot of the engine's run state as reported to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimStateInfo {
    pub state: SimState,
    pub world_time_usec: i64,
    pub pdu_created: bool,
    pub simulation_mode: bool,
    pub pdu_sync_mode: bool,
}

/// The simulation engine as seen by the RPC layer.
pub trait SimulationEngine: Send + Sync {
    /// Current run state as visible to `client`.
    fn state(&self, client: &str) -> SimStateInfo;

    /// Request a simulation start. `false` means refused or failed.
    fn start(&self) -> bool;

    /// Request a simulation stop.
    fn stop(&self) -> bool;

    /// Request a simulation reset.
    fn reset(&self) -> bool;

    /// Register a joining asset. `false` means refused (e.g. duplicate).
    fn register_asset(&self, name: &str) -> bool;

    /// Acknowledge that `name` completed its start transition.
    fn ack_start(&self, name: &str) -> bool;

    /// Acknowledge that `name` completed its stop transition.
    fn ack_stop(&self, name: &str) -> bool;

    /// Acknowledge that `name` completed its reset transition.
    fn ack_reset(&self, name: &str) -> bool;

    /// Pop the next lifecycle event queued for `name`.
    fn fetch_event(&self, name: &str) -> AssetEvent;

    /// Advance world time. Called only from the conductor thread.
    fn advance(&self, delta_usec: i64);
}

#[derive(Debug)]
struct EngineState {
    state: SimState,
    world_time_usec: i64,
    assets: Vec<String>,
    events: HashMap<String, VecDeque<AssetEvent>>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            state: SimState::Stopped,
            world_time_usec: 0,
            assets: Vec::new(),
            events: HashMap::new(),
        }
    }
}

/// A minimal engine holding its whole world under one lock.
#[derive(Debug)]
pub struct InMemoryEngine {
    inner: Mutex<EngineState>,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EngineState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of registered assets.
    pub fn register_count(&self) -> usize {
        self.lock().assets.len()
    }

    /// Whether `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().assets.iter().any(|a| a == name)
    }

    /// Queue a lifecycle event for an asset.
    pub fn push_event(&self, name: &str, event: AssetEvent) {
        self.lock()
            .events
            .entry(name.to_owned())
            .or_default()
            .push_back(event);
    }

    #[cfg(test)]
    fn current_state(&self) -> SimState {
        self.lock().state
    }
}

impl SimulationEngine for InMemoryEngine {
    fn state(&self, _client: &str) -> SimStateInfo {
        let inner = self.lock();
        SimStateInfo {
            state: inner.state,
            world_time_usec: inner.world_time_usec,
            pdu_created: !inner.assets.is_empty(),
            simulation_mode: true,
            pdu_sync_mode: false,
        }
    }

    fn start(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            SimState::Stopped | SimState::Runnable => {
                inner.state = SimState::Running;
                true
            }
            _ => false,
        }
    }

    fn stop(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            SimState::Running => {
                inner.state = SimState::Stopped;
                true
            }
            _ => false,
        }
    }

    fn reset(&self) -> bool {
        let mut inner = self.lock();
        inner.state = SimState::Stopped;
        inner.world_time_usec = 0;
        true
    }

    fn register_asset(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let mut inner = self.lock();
        if inner.assets.iter().any(|a| a == name) {
            return false;
        }
        inner.assets.push(name.to_owned());
        true
    }

    fn ack_start(&self, name: &str) -> bool {
        self.is_registered(name)
    }

    fn ack_stop(&self, name: &str) -> bool {
        self.is_registered(name)
    }

    fn ack_reset(&self, name: &str) -> bool {
        self.is_registered(name)
    }

    fn fetch_event(&self, name: &str) -> AssetEvent {
        self.lock()
            .events
            .get_mut(name)
            .and_then(|q| q.pop_front())
            .unwrap_or(AssetEvent::None)
    }

    fn advance(&self, delta_usec: i64) {
        let mut inner = self.lock();
        if inner.state == SimState::Running {
            inner.world_time_usec += delta_usec;
        }
    }
}
