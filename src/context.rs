//! Server-side session context.
//!
//! Tracks whether a client has joined and which client identity the server
//! accepts. The identity is bound once at configuration time and never
//! reset during the life of the process.

use std::sync::{Mutex, PoisonError};

/// Lifecycle of the server's single client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// No client has joined yet.
    NotReady,
    /// A client joined; further joins are refused.
    Started,
    /// The context entered an unrecoverable error state.
    Error,
}

/// Shared server context. Has its own lock, independent of the dispatch
/// engine's lock; the two are never held together.
#[derive(Debug)]
pub struct ServerContext {
    status: Mutex<ServerStatus>,
    client_node_id: String,
}

impl ServerContext {
    /// Create a context bound to the configured client identity.
    pub fn new(client_node_id: impl Into<String>) -> Self {
        Self {
            status: Mutex::new(ServerStatus::NotReady),
            client_node_id: client_node_id.into(),
        }
    }

    /// The client identity this server accepts.
    #[inline]
    pub fn client_node_id(&self) -> &str {
        &self.client_node_id
    }

    /// Whether a request's claimed identity matches the bound one.
    #[inline]
    pub fn matches_client(&self, name: &str) -> bool {
        self.client_node_id == name
    }

    /// Current status.
    pub fn status(&self) -> ServerStatus {
        *self
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempt the one NotReady -> Started transition.
    ///
    /// Single lock acquisition; returns `true` exactly once. Any other
    /// current status is reported as failure without mutation.
    pub fn try_begin_join(&self) -> bool {
        let mut status = self
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *status == ServerStatus::NotReady {
            *status = ServerStatus::Started;
            true
        } else {
            false
        }
    }

    /// Mark the context as failed.
    pub fn set_error(&self) {
        *self
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = ServerStatus::Error;
    }
}
