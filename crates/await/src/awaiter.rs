use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kready_core::{fields, Severity, WatchEvent};
use metrics::{counter, histogram};
use smallvec::SmallVec;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{AwaitError, Unready, NO_ADDRESS, NO_BACKENDS};
use crate::settle::{Immediate, SettleSchedule, SettleTimer};
use crate::state::ReadinessState;
use crate::{AwaitConfig, AWAIT_TIMEOUT, SETTLE_DELAY, WARNING_LOOKUP_TIMEOUT};

/// Why the await loop woke up. Exactly one is handled per turn.
#[derive(Debug)]
pub enum Wake {
    Service(WatchEvent<Service>),
    Endpoints(WatchEvent<Endpoints>),
    Settled,
    Cancelled,
    TimedOut,
}

/// Terminal result of handling a wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Cut short, but Service and Endpoints were already ready.
    Ready,
    Cancelled,
    TimedOut,
}

/// Readiness awaiter for one Service. Owns its state; not shared.
pub struct ServiceAwaiter {
    pub(crate) config: AwaitConfig,
    pub(crate) state: ReadinessState,
    pub(crate) address_announced: bool,
}

impl ServiceAwaiter {
    pub fn new(config: AwaitConfig) -> Self {
        Self { config, state: ReadinessState::default(), address_announced: false }
    }

    pub fn state(&self) -> &ReadinessState { &self.state }

    /// Open both watches and run the loop until ready, cancelled or
    /// [`AWAIT_TIMEOUT`] elapses.
    pub async fn await_ready(&mut self) -> Result<(), AwaitError> {
        let t0 = std::time::Instant::now();
        let id = self.config.id.clone();
        let source = self.config.source.clone();

        let services = source
            .watch_services(&id.namespace)
            .await
            .map_err(|e| AwaitError::Setup { what: "Service watch", id: id.clone(), source: e.into() })?;
        let endpoints = source
            .watch_endpoints(&id.namespace)
            .await
            .map_err(|e| AwaitError::Setup { what: "Endpoints watch", id: id.clone(), source: e.into() })?;

        info!(svc = %id, "awaiting service readiness");
        let res = self.run(services, endpoints, Instant::now() + AWAIT_TIMEOUT).await;
        histogram!("service_await_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        match &res {
            Ok(()) => {
                counter!("service_await_ok", 1u64);
                info!(svc = %id, elapsed_ms = t0.elapsed().as_millis() as u64, "service ready");
            }
            Err(AwaitError::Cancelled(_)) => { counter!("service_await_cancelled", 1u64); }
            Err(AwaitError::Timeout(_)) => { counter!("service_await_timeout", 1u64); }
            Err(_) => {}
        }
        res
    }

    /// The await loop proper, with the streams and deadline injected.
    /// Both streams are dropped, releasing their watches, on every return.
    pub async fn run<S, E>(&mut self, services: S, endpoints: E, deadline: Instant) -> Result<(), AwaitError>
    where
        S: Stream<Item = WatchEvent<Service>> + Unpin,
        E: Stream<Item = WatchEvent<Endpoints>> + Unpin,
    {
        let mut services = services.fuse();
        let mut endpoints = endpoints.fuse();
        let mut settle = SettleTimer::new(SETTLE_DELAY);
        let cancel = self.config.cancel.clone();
        let timeout = tokio::time::sleep_until(deadline);
        tokio::pin!(timeout);

        while !self.state.succeeded() {
            // An ended stream stops matching `Some(..)` and is skipped from then on.
            let wake = tokio::select! {
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = &mut timeout => Wake::TimedOut,
                _ = settle.fired() => Wake::Settled,
                Some(ev) = services.next() => Wake::Service(ev),
                Some(ev) = endpoints.next() => Wake::Endpoints(ev),
            };
            match self.handle(wake, &mut settle) {
                None => {}
                Some(Exit::Ready) => return Ok(()),
                Some(Exit::Cancelled) => return Err(AwaitError::Cancelled(self.unready().await)),
                Some(Exit::TimedOut) => return Err(AwaitError::Timeout(self.unready().await)),
            }
        }
        Ok(())
    }

    /// Apply one wake to the state. Returns `Some` when the loop must stop.
    pub fn handle<T: SettleSchedule>(&mut self, wake: Wake, settle: &mut T) -> Option<Exit> {
        match wake {
            Wake::Service(ev) => self.process_service_event(&ev),
            Wake::Endpoints(ev) => self.process_endpoints_event(&ev, settle),
            Wake::Settled => self.on_settled(),
            Wake::Cancelled => {
                return Some(if self.state.ready_ignoring_settle() { Exit::Ready } else { Exit::Cancelled });
            }
            Wake::TimedOut => {
                return Some(if self.state.ready_ignoring_settle() { Exit::Ready } else { Exit::TimedOut });
            }
        }
        None
    }

    /// Safe to receive repeatedly; only the current `endpoints_ready` matters.
    fn on_settled(&mut self) {
        let name = &self.config.id.name;
        if self.state.endpoints_ready {
            self.emit(Severity::Info, &format!("Service '{}' successfully created endpoint objects", name));
        } else {
            self.emit(Severity::Warning, &format!("Service '{}' does not target any Pods", name));
        }
        self.state.endpoints_settled = true;
    }

    /// Snapshot verdict: replay the live Service and all Endpoints in the
    /// namespace as `Added` events, with the settle window deemed elapsed.
    pub async fn read(&mut self) -> Result<(), AwaitError> {
        let id = self.config.id.clone();
        let source = self.config.source.clone();

        // Returned as-is so a 404 reads as "deleted".
        let service = source.get_service(&id.namespace, &id.name).await.map_err(AwaitError::Fetch)?;

        let endpoints = match source.list_endpoints(&id.namespace).await {
            Ok(items) => items,
            Err(e) => {
                debug!(svc = %id, error = %e, "listing endpoints failed; treating as empty");
                Vec::new()
            }
        };

        if self.replay(&service, endpoints) {
            counter!("service_read_ok", 1u64);
            return Ok(());
        }
        counter!("service_read_not_ready", 1u64);
        Err(AwaitError::Initialization { unready: self.unready().await, object: Box::new(service) })
    }

    /// Rebuild state from a single observation. Returns the success predicate.
    pub fn replay<I>(&mut self, service: &Service, endpoints: I) -> bool
    where
        I: IntoIterator<Item = Endpoints>,
    {
        self.state = ReadinessState::default();
        self.process_service_event(&WatchEvent::added(service.clone()));
        for ep in endpoints {
            self.process_endpoints_event(&WatchEvent::added(ep), &mut Immediate);
        }
        self.state.endpoints_settled = true;
        self.state.succeeded()
    }

    /// Unmet conditions, derived from the current flags.
    pub fn reasons(&self) -> SmallVec<[String; 2]> {
        let mut out = SmallVec::new();
        if !self.state.endpoints_ready {
            out.push(NO_BACKENDS.to_string());
        }
        if self.requires_address() && !self.state.service_ready {
            out.push(NO_ADDRESS.to_string());
        }
        out
    }

    async fn unready(&self) -> Unready {
        let id = self.config.id.clone();
        let warnings = match &self.config.warnings {
            Some(lookup) => {
                let lookup = lookup.recent_warnings(&id, "Service", self.config.warning_limit);
                match tokio::time::timeout(WARNING_LOOKUP_TIMEOUT, lookup).await {
                    Ok(Ok(w)) => w,
                    Ok(Err(e)) => {
                        debug!(svc = %id, error = %e, "could not retrieve warning events");
                        Vec::new()
                    }
                    Err(_) => {
                        debug!(svc = %id, "warning event lookup timed out");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };
        let reasons = self.reasons();
        warn!(svc = %id, reasons = ?reasons, "service not ready");
        Unready { id, reasons, warnings }
    }

    pub(crate) fn requires_address(&self) -> bool {
        fields::service_type(&self.config.inputs).requires_external_address()
    }

    pub(crate) fn emit(&self, severity: Severity, message: &str) {
        if let Some(sink) = &self.config.diagnostics {
            sink.log(severity, &self.config.urn(), message);
        }
    }
}
