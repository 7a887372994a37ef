#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::{channel::mpsc, StreamExt};
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kready_await::AwaitConfig;
use kready_core::{DiagnosticSink, EventSummary, ResourceId, Severity, WatchEvent};
use kready_kubehub::{ResourceSource, WarningLookup, WatchStream};

pub fn service(name: &str, ty: &str, ingress: &[&str]) -> Service {
    let ing: Vec<_> = ingress.iter().map(|ip| serde_json::json!({ "ip": ip })).collect();
    serde_json::from_value(serde_json::json!({
        "metadata": { "name": name, "namespace": "default" },
        "spec": { "type": ty },
        "status": { "loadBalancer": { "ingress": ing } }
    }))
    .expect("service json")
}

pub fn endpoints(name: &str, subsets: usize) -> Endpoints {
    let subs: Vec<_> = (0..subsets)
        .map(|i| serde_json::json!({ "addresses": [ { "ip": format!("10.0.0.{}", i + 1) } ] }))
        .collect();
    serde_json::from_value(serde_json::json!({
        "metadata": { "name": name, "namespace": "default" },
        "subsets": subs
    }))
    .expect("endpoints json")
}

pub fn not_found(name: &str) -> kube::Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".into(),
        message: format!("services \"{}\" not found", name),
        reason: "NotFound".into(),
        code: 404,
    })
}

/// Test double handing out pre-built streams and canned snapshot results.
#[derive(Default)]
pub struct FakeSource {
    services: Mutex<Option<WatchStream<Service>>>,
    endpoints: Mutex<Option<WatchStream<Endpoints>>>,
    get: Mutex<Option<kube::Result<Service>>>,
    list: Mutex<Option<Result<Vec<Endpoints>>>>,
}

impl FakeSource {
    pub fn with_streams(services: WatchStream<Service>, endpoints: WatchStream<Endpoints>) -> Self {
        Self { services: Mutex::new(Some(services)), endpoints: Mutex::new(Some(endpoints)), ..Default::default() }
    }

    /// Service watch opens, Endpoints watch is refused.
    pub fn with_service_stream(services: WatchStream<Service>) -> Self {
        Self { services: Mutex::new(Some(services)), ..Default::default() }
    }

    pub fn with_snapshot(get: kube::Result<Service>, list: Result<Vec<Endpoints>>) -> Self {
        Self { get: Mutex::new(Some(get)), list: Mutex::new(Some(list)), ..Default::default() }
    }
}

#[async_trait::async_trait]
impl ResourceSource for FakeSource {
    async fn watch_services(&self, _namespace: &str) -> Result<WatchStream<Service>> {
        self.services.lock().unwrap().take().ok_or_else(|| anyhow::anyhow!("service watch refused"))
    }

    async fn watch_endpoints(&self, _namespace: &str) -> Result<WatchStream<Endpoints>> {
        self.endpoints.lock().unwrap().take().ok_or_else(|| anyhow::anyhow!("endpoints watch refused"))
    }

    async fn get_service(&self, _namespace: &str, name: &str) -> kube::Result<Service> {
        self.get.lock().unwrap().take().unwrap_or_else(|| Err(not_found(name)))
    }

    async fn list_endpoints(&self, _namespace: &str) -> Result<Vec<Endpoints>> {
        self.list.lock().unwrap().take().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Live watch feeds: keep the senders to push events, hand the receivers to the source.
pub struct Feeds {
    pub services: mpsc::UnboundedSender<WatchEvent<Service>>,
    pub endpoints: mpsc::UnboundedSender<WatchEvent<Endpoints>>,
}

pub fn feeds() -> (Feeds, WatchStream<Service>, WatchStream<Endpoints>) {
    let (stx, srx) = mpsc::unbounded();
    let (etx, erx) = mpsc::unbounded();
    (Feeds { services: stx, endpoints: etx }, srx.boxed(), erx.boxed())
}

#[derive(Default)]
pub struct RecordingSink {
    pub lines: Mutex<Vec<(Severity, String)>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.lines.lock().unwrap().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn log(&self, severity: Severity, _urn: &str, message: &str) {
        self.lines.lock().unwrap().push((severity, message.to_string()));
    }
}

pub struct FixedWarnings(pub Result<Vec<EventSummary>, String>);

#[async_trait::async_trait]
impl WarningLookup for FixedWarnings {
    async fn recent_warnings(&self, _id: &ResourceId, _kind: &str, limit: usize) -> Result<Vec<EventSummary>> {
        match &self.0 {
            Ok(w) => Ok(w.iter().take(limit).cloned().collect()),
            Err(e) => Err(anyhow::anyhow!(e.clone())),
        }
    }
}

/// Warning lookup that never answers.
pub struct StalledWarnings;

#[async_trait::async_trait]
impl WarningLookup for StalledWarnings {
    async fn recent_warnings(&self, _id: &ResourceId, _kind: &str, _limit: usize) -> Result<Vec<EventSummary>> {
        futures::future::pending().await
    }
}

pub fn config(declared: Service, source: FakeSource) -> AwaitConfig {
    AwaitConfig::new(ResourceId::new("default", "web"), declared, Arc::new(source))
}
