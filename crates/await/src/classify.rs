//! Per-event classifiers. Each accepted event recomputes its flag from scratch.

use k8s_openapi::api::core::v1::{Endpoints, Service};
use kready_core::{fields, EventType, Severity, WatchEvent};
use tracing::debug;

use crate::awaiter::ServiceAwaiter;
use crate::settle::SettleSchedule;

impl ServiceAwaiter {
    pub(crate) fn process_service_event(&mut self, event: &WatchEvent<Service>) {
        let target = self.config.id.name.as_str();
        let Some(name) = fields::object_name(&event.object) else {
            debug!(svc = %target, "service event without metadata.name");
            return;
        };
        if name != target {
            return;
        }

        self.state.service_ready = false;
        if event.is_deleted() {
            debug!(svc = %target, "service deleted");
            return;
        }

        if !self.requires_address() {
            self.state.service_ready = true;
            return;
        }

        debug!(svc = %target, status = ?event.object.status, "received status for service");
        self.state.service_ready = fields::has_ingress(&event.object);
        if !self.state.service_ready {
            debug!(svc = %target, "waiting for load balancer to assign IP/hostname");
            return;
        }
        if !self.address_announced {
            self.address_announced = true;
            debug!(svc = %target, addrs = ?fields::ingress_addresses(&event.object), "address allocated");
            self.emit(Severity::Info, "Service has been allocated an IP");
        }
    }

    pub(crate) fn process_endpoints_event<T: SettleSchedule>(&mut self, event: &WatchEvent<Endpoints>, settle: &mut T) {
        // Endpoints share their Service's name, unique within the namespace.
        if fields::object_name(&event.object) != Some(self.config.id.name.as_str()) {
            return;
        }

        self.state.endpoints_ready = match event.kind {
            EventType::Added | EventType::Modified => fields::has_subsets(&event.object),
            EventType::Deleted => false,
        };
        debug!(svc = %self.config.id, kind = ?event.kind, ready = self.state.endpoints_ready, "endpoints event");

        // Give the object a quiet period to settle after every change.
        self.state.endpoints_settled = false;
        settle.schedule();
    }
}
