//! Pending-request table: one slot per service name.
//!
//! The single-slot rule is the backpressure mechanism. While a service's
//! request is being processed its slot stays occupied, and any further
//! request for the same service is refused at insert time. The poll loop
//! drops refused requests; the client's own timeout covers recovery.

use std::collections::HashMap;

use crate::transport::RpcRequest;

/// Map of single request slots keyed by service name.
#[derive(Debug, Default)]
pub struct Mailbox {
    slots: HashMap<String, RpcRequest>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request if its service slot is free.
    ///
    /// Returns `false` without mutating when the slot is occupied.
    pub fn try_insert(&mut self, request: RpcRequest) -> bool {
        let key = request.header.service_name.clone();
        match self.slots.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(request);
                true
            }
        }
    }

    /// Clone one arbitrary pending request, leaving its slot occupied.
    ///
    /// The slot stays occupied until [`Mailbox::remove`] so that a request
    /// being processed still blocks its service's slot.
    pub fn next_job(&self) -> Option<RpcRequest> {
        self.slots.values().next().cloned()
    }

    /// Free a service's slot. Returns whether a request was present.
    pub fn remove(&mut self, service: &str) -> bool {
        self.slots.remove(service).is_some()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn contains(&self, service: &str) -> bool {
        self.slots.contains_key(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ServiceRequestHeader;

    fn request(service: &str, id: u32) -> RpcRequest {
        RpcRequest {
            header: ServiceRequestHeader {
                request_id: id,
                service_name: service.to_owned(),
                client_name: "asset-1".to_owned(),
                opcode: 0,
                poll_interval_msec: 0,
            },
            packet: Vec::new(),
        }
    }

    #[test]
    fn second_insert_for_same_service_refused() {
        let mut mb = Mailbox::new();
        assert!(mb.try_insert(request("SimLink/Join", 1)));
        assert!(!mb.try_insert(request("SimLink/Join", 2)));
        assert_eq!(mb.len(), 1);
        // the original request survives the refused insert
        assert_eq!(mb.next_job().unwrap().header.request_id, 1);
    }

    #[test]
    fn different_services_coexist() {
        let mut mb = Mailbox::new();
        assert!(mb.try_insert(request("SimLink/Join", 1)));
        assert!(mb.try_insert(request("SimLink/GetEvent", 2)));
        assert_eq!(mb.len(), 2);
    }

    #[test]
    fn next_job_keeps_slot_occupied_until_remove() {
        let mut mb = Mailbox::new();
        mb.try_insert(request("SimLink/Join", 1));
        let job = mb.next_job().unwrap();
        assert!(mb.contains(&job.header.service_name));
        assert!(!mb.try_insert(request("SimLink/Join", 3)));
        assert!(mb.remove(&job.header.service_name));
        assert!(mb.try_insert(request("SimLink/Join", 3)));
    }

    #[test]
    fn remove_missing_service_reports_absent() {
        let mut mb = Mailbox::new();
        assert!(!mb.remove("SimLink/Join"));
    }
}
