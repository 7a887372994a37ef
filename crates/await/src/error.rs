use std::fmt;

use k8s_openapi::api::core::v1::Service;
use kready_core::{EventSummary, ResourceId};
use smallvec::SmallVec;

pub const NO_BACKENDS: &str = "Service does not target any Pods";
pub const NO_ADDRESS: &str = "Service was not allocated an IP address";

/// Why a Service was judged not ready at verdict time.
#[derive(Debug, Clone)]
pub struct Unready {
    pub id: ResourceId,
    pub reasons: SmallVec<[String; 2]>,
    /// Recent Warning events for the Service, if a lookup was configured.
    pub warnings: Vec<EventSummary>,
}

impl fmt::Display for Unready {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.reasons {
            write!(f, "\n    * {}", r)?;
        }
        if !self.warnings.is_empty() {
            write!(f, "\n  recent warning events:")?;
            for w in &self.warnings {
                write!(f, "\n    {}", w)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AwaitError {
    #[error("could not set up {what} for Service '{id}'")]
    Setup {
        what: &'static str,
        id: ResourceId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("timed out waiting for Service '{}' to become ready{}", .0.id, .0)]
    Timeout(Unready),
    #[error("cancelled while waiting for Service '{}' to become ready{}", .0.id, .0)]
    Cancelled(Unready),
    #[error("Service '{}' was created but failed to initialize{}", .unready.id, .unready)]
    Initialization { unready: Unready, object: Box<Service> },
    /// The live Service could not be read. Never wrapped: a 404 here means the
    /// Service is gone.
    #[error(transparent)]
    Fetch(kube::Error),
}

impl AwaitError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwaitError::Fetch(kube::Error::Api(ae)) if ae.code == 404)
    }

    pub fn unready(&self) -> Option<&Unready> {
        match self {
            AwaitError::Timeout(u) | AwaitError::Cancelled(u) => Some(u),
            AwaitError::Initialization { unready, .. } => Some(unready),
            _ => None,
        }
    }

    pub fn reasons(&self) -> &[String] {
        self.unready().map(|u| u.reasons.as_slice()).unwrap_or(&[])
    }

    /// Short machine-readable tag for the error kind.
    pub fn outcome(&self) -> &'static str {
        match self {
            AwaitError::Setup { .. } => "setup_failed",
            AwaitError::Timeout(_) => "timeout",
            AwaitError::Cancelled(_) => "cancelled",
            AwaitError::Initialization { .. } => "not_initialized",
            AwaitError::Fetch(_) if self.is_not_found() => "not_found",
            AwaitError::Fetch(_) => "fetch_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;
    use smallvec::smallvec;

    fn unready(reasons: &[&str]) -> Unready {
        Unready {
            id: ResourceId::new("default", "web"),
            reasons: reasons.iter().map(|s| s.to_string()).collect(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn timeout_message_lists_reasons() {
        let e = AwaitError::Timeout(unready(&[NO_BACKENDS, NO_ADDRESS]));
        let msg = e.to_string();
        assert!(msg.starts_with("timed out waiting for Service 'default/web'"), "msg={}", msg);
        assert!(msg.contains("* Service does not target any Pods"));
        assert!(msg.contains("* Service was not allocated an IP address"));
        assert_eq!(e.outcome(), "timeout");
        assert_eq!(e.reasons().len(), 2);
    }

    #[test]
    fn warnings_are_rendered_after_reasons() {
        let mut u = unready(&[NO_BACKENDS]);
        u.warnings.push(EventSummary { reason: "FailedSync".into(), message: "boom".into(), count: 1, last_seen: None });
        let msg = AwaitError::Cancelled(u).to_string();
        let reason_at = msg.find(NO_BACKENDS).unwrap();
        let warn_at = msg.find("[FailedSync] boom").unwrap();
        assert!(reason_at < warn_at);
    }

    #[test]
    fn not_found_is_detected_through_fetch() {
        let e = AwaitError::Fetch(kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "services \"web\" not found".into(),
            reason: "NotFound".into(),
            code: 404,
        }));
        assert!(e.is_not_found());
        assert_eq!(e.outcome(), "not_found");
        assert!(e.reasons().is_empty());
        // transparent: message is the kube error's own
        assert!(e.to_string().contains("not found"));
    }

    #[test]
    fn initialization_carries_object() {
        let u = Unready { id: ResourceId::new("ns", "db"), reasons: smallvec![NO_BACKENDS.to_string()], warnings: vec![] };
        let e = AwaitError::Initialization { unready: u, object: Box::new(Service::default()) };
        assert_eq!(e.to_string(), "Service 'ns/db' was created but failed to initialize\n    * Service does not target any Pods");
    }
}
