//! kready kubehub: kube-backed watch sources, snapshot reads and warning lookup.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use futures::{stream::BoxStream, StreamExt};
use k8s_openapi::api::core::v1::{Endpoints, Event, Service};
use kube::{
    api::{Api, ListParams, WatchEvent as KubeWatchEvent, WatchParams},
    Client,
};
use kready_core::{EventSummary, ResourceId, WatchEvent};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Live, non-restartable change stream for one kind in one namespace.
/// Dropping the stream stops the underlying watch.
pub type WatchStream<K> = BoxStream<'static, WatchEvent<K>>;

/// Everything the awaiter needs from the control plane.
#[async_trait::async_trait]
pub trait ResourceSource: Send + Sync {
    async fn watch_services(&self, namespace: &str) -> Result<WatchStream<Service>>;
    async fn watch_endpoints(&self, namespace: &str) -> Result<WatchStream<Endpoints>>;

    /// Fetch the live Service. Errors are returned as-is so callers can detect 404.
    async fn get_service(&self, namespace: &str, name: &str) -> kube::Result<Service>;

    async fn list_endpoints(&self, namespace: &str) -> Result<Vec<Endpoints>>;
}

/// Lookup of recent Warning events for an object, used to enrich errors.
#[async_trait::async_trait]
pub trait WarningLookup: Send + Sync {
    async fn recent_warnings(&self, id: &ResourceId, kind: &str, limit: usize) -> Result<Vec<EventSummary>>;
}

/// Build a client from the ambient kubeconfig / in-cluster environment.
pub async fn get_kube_client() -> Result<Client> {
    Client::try_default().await.context("building kube client from default config")
}

/// Default implementation using kube-rs client APIs.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    pub fn new(client: Client) -> Self { Self { client } }

    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(get_kube_client().await?))
    }

    pub fn client(&self) -> &Client { &self.client }

    async fn watch_kind<K>(&self, namespace: &str) -> Result<WatchStream<K>>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + std::fmt::Debug
            + Send
            + 'static,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let kind = K::kind(&K::DynamicType::default()).to_string();
        let stream = api
            .watch(&WatchParams::default(), "0")
            .await
            .with_context(|| format!("opening {} watch in namespace '{}'", kind, namespace))?;
        info!(kind = %kind, ns = %namespace, "watch started");
        Ok(stream
            .filter_map(move |res| {
                let ev = translate(res, &kind);
                async move { ev }
            })
            .boxed())
    }
}

/// Map a raw kube watch item onto our event type. Bookmarks and in-stream
/// errors carry no object and are dropped.
fn translate<K>(res: kube::Result<KubeWatchEvent<K>>, kind: &str) -> Option<WatchEvent<K>> {
    match res {
        Ok(KubeWatchEvent::Added(o)) => Some(WatchEvent::added(o)),
        Ok(KubeWatchEvent::Modified(o)) => Some(WatchEvent::modified(o)),
        Ok(KubeWatchEvent::Deleted(o)) => Some(WatchEvent::deleted(o)),
        Ok(KubeWatchEvent::Bookmark(_)) => None,
        Ok(KubeWatchEvent::Error(e)) => {
            warn!(kind = %kind, code = e.code, reason = %e.reason, message = %e.message, "watch error event");
            None
        }
        Err(e) => {
            warn!(kind = %kind, error = %e, "watch stream error");
            None
        }
    }
}

#[async_trait::async_trait]
impl ResourceSource for KubeSource {
    async fn watch_services(&self, namespace: &str) -> Result<WatchStream<Service>> {
        self.watch_kind::<Service>(namespace).await
    }

    async fn watch_endpoints(&self, namespace: &str) -> Result<WatchStream<Endpoints>> {
        self.watch_kind::<Endpoints>(namespace).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> kube::Result<Service> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await
    }

    async fn list_endpoints(&self, namespace: &str) -> Result<Vec<Endpoints>> {
        let api: Api<Endpoints> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("listing Endpoints in namespace '{}'", namespace))?;
        Ok(list.items)
    }
}

#[async_trait::async_trait]
impl WarningLookup for KubeSource {
    async fn recent_warnings(&self, id: &ResourceId, kind: &str, limit: usize) -> Result<Vec<EventSummary>> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), &id.namespace);
        let lp = ListParams::default().fields(&warning_selector(&id.name, kind));
        let events = api
            .list(&lp)
            .await
            .with_context(|| format!("listing warning events for {} '{}'", kind, id))?;
        debug!(obj = %id, total = events.items.len(), "warning events listed");
        Ok(newest_warnings(events.items, limit))
    }
}

fn warning_selector(name: &str, kind: &str) -> String {
    format!("involvedObject.name={},involvedObject.kind={},type=Warning", name, kind)
}

/// Keep the `limit` most recent events, oldest first.
fn newest_warnings(mut events: Vec<Event>, limit: usize) -> Vec<EventSummary> {
    let seen = |e: &Event| e.last_timestamp.as_ref().map(|t| t.0).or_else(|| e.event_time.as_ref().map(|t| t.0));
    events.retain(|e| e.type_.as_deref().map(|t| t == "Warning").unwrap_or(true));
    events.sort_by_key(seen);
    let skip = events.len().saturating_sub(limit);
    events
        .into_iter()
        .skip(skip)
        .map(|e| EventSummary {
            last_seen: seen(&e),
            reason: e.reason.unwrap_or_default(),
            message: e.message.unwrap_or_default(),
            count: e.count.unwrap_or(1),
        })
        .collect()
}
