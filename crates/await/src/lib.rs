//! kready await engine.
//!
//! Decides when a Service and its same-named Endpoints object have become
//! usable. Two modes share the same classifiers:
//!
//! - live: multiplex a Service watch, an Endpoints watch, a settle timer, a
//!   cancellation token and a timeout until the pair is ready
//!   ([`await_service_init`]);
//! - snapshot: replay the current objects once and return a verdict
//!   ([`read_service_init`]).
//!
//! A Service is ready once (a) it exists and, for `LoadBalancer` types, has an
//! ingress address, (b) its Endpoints list at least one subset, and (c) no
//! Endpoints change has been seen for [`SETTLE_DELAY`].

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Service;
use kready_core::{DiagnosticSink, ResourceId, Severity};
use kready_kubehub::{ResourceSource, WarningLookup};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod awaiter;
mod classify;
pub mod error;
pub mod settle;
pub mod state;

pub use awaiter::{Exit, ServiceAwaiter, Wake};
pub use error::{AwaitError, Unready};
pub use state::ReadinessState;

/// Upper bound for one live await.
pub const AWAIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Quiet period required after the last Endpoints change.
pub const SETTLE_DELAY: Duration = Duration::from_secs(10);
/// Bound on the Warning-event lookup made when building a not-ready verdict.
pub const WARNING_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

const SERVICE_KIND_KEY: &str = "v1/Service";

fn warning_limit() -> usize {
    std::env::var("KREADY_WARNING_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(3)
}

/// Inputs for one await/read. Never mutated by the engine.
#[derive(Clone)]
pub struct AwaitConfig {
    pub id: ResourceId,
    /// Declared Service; its `spec.type` decides whether an address is required.
    pub inputs: Service,
    pub source: Arc<dyn ResourceSource>,
    pub diagnostics: Option<Arc<dyn DiagnosticSink>>,
    pub warnings: Option<Arc<dyn WarningLookup>>,
    pub warning_limit: usize,
    pub cancel: CancellationToken,
}

impl AwaitConfig {
    pub fn new(id: ResourceId, inputs: Service, source: Arc<dyn ResourceSource>) -> Self {
        Self {
            id,
            inputs,
            source,
            diagnostics: None,
            warnings: None,
            warning_limit: warning_limit(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn with_warnings(mut self, lookup: Arc<dyn WarningLookup>) -> Self {
        self.warnings = Some(lookup);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn urn(&self) -> String {
        self.id.urn(SERVICE_KIND_KEY)
    }
}

/// Wait (up to [`AWAIT_TIMEOUT`]) for the Service to become ready.
pub async fn await_service_init(config: AwaitConfig) -> Result<(), AwaitError> {
    ServiceAwaiter::new(config).await_ready().await
}

/// One-shot readiness verdict from the current cluster state.
pub async fn read_service_init(config: AwaitConfig) -> Result<(), AwaitError> {
    ServiceAwaiter::new(config).read().await
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn log(&self, severity: Severity, urn: &str, message: &str) {
        match severity {
            Severity::Info => info!(urn = %urn, "{}", message),
            Severity::Warning => warn!(urn = %urn, "{}", message),
        }
    }
}
