//! Typed accessors for the Service/Endpoints fields readiness depends on.
//!
//! Every accessor treats an absent field, or an absent `spec`/`status` block,
//! as "not ready" rather than as an error:
//! - `spec.type` absent => `ClusterIP` (the API server default)
//! - `status.loadBalancer.ingress` absent => no address allocated
//! - `subsets` absent => zero live backends

use k8s_openapi::api::core::v1::{Endpoints, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::Metadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceType {
    ClusterIp,
    NodePort,
    LoadBalancer,
    ExternalName,
    Other(String),
}

impl ServiceType {
    pub fn parse(s: &str) -> Self {
        // Case-sensitive: the API server only accepts the canonical spelling.
        match s {
            "ClusterIP" => ServiceType::ClusterIp,
            "NodePort" => ServiceType::NodePort,
            "LoadBalancer" => ServiceType::LoadBalancer,
            "ExternalName" => ServiceType::ExternalName,
            other => ServiceType::Other(other.to_string()),
        }
    }

    /// Only load-balanced Services wait for an externally routable address.
    pub fn requires_external_address(&self) -> bool {
        matches!(self, ServiceType::LoadBalancer)
    }
}

/// Name of any namespaced object, if set.
pub fn object_name<K: Metadata<Ty = ObjectMeta>>(obj: &K) -> Option<&str> {
    obj.metadata().name.as_deref()
}

pub fn service_type(svc: &Service) -> ServiceType {
    svc.spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .map(ServiceType::parse)
        .unwrap_or(ServiceType::ClusterIp)
}

/// True iff `status.loadBalancer.ingress` is a non-empty list.
pub fn has_ingress(svc: &Service) -> bool {
    svc.status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ing| !ing.is_empty())
        .unwrap_or(false)
}

/// Allocated ingress addresses, preferring `ip` over `hostname` per entry.
pub fn ingress_addresses(svc: &Service) -> Vec<String> {
    let Some(ingress) = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
    else {
        return Vec::new();
    };
    ingress
        .iter()
        .filter_map(|it| it.ip.clone().or_else(|| it.hostname.clone()))
        .collect()
}

/// True iff the Endpoints object carries at least one subset.
pub fn has_subsets(ep: &Endpoints) -> bool {
    ep.subsets.as_ref().map(|s| !s.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc(v: serde_json::Value) -> Service {
        serde_json::from_value(v).expect("service json")
    }

    #[test]
    fn missing_type_defaults_to_cluster_ip() {
        let s = svc(serde_json::json!({ "metadata": { "name": "web" } }));
        assert_eq!(service_type(&s), ServiceType::ClusterIp);
        assert!(!service_type(&s).requires_external_address());
    }

    #[test]
    fn type_match_is_case_sensitive() {
        assert_eq!(ServiceType::parse("LoadBalancer"), ServiceType::LoadBalancer);
        assert_eq!(ServiceType::parse("loadbalancer"), ServiceType::Other("loadbalancer".into()));
    }

    #[test]
    fn ingress_absent_or_empty_is_not_allocated() {
        let none = svc(serde_json::json!({ "metadata": { "name": "web" }, "spec": { "type": "LoadBalancer" } }));
        assert!(!has_ingress(&none));
        let empty = svc(serde_json::json!({
            "metadata": { "name": "web" },
            "status": { "loadBalancer": { "ingress": [] } }
        }));
        assert!(!has_ingress(&empty));
        let some = svc(serde_json::json!({
            "metadata": { "name": "web" },
            "status": { "loadBalancer": { "ingress": [ { "hostname": "lb.example.com" }, { "ip": "10.0.0.7" } ] } }
        }));
        assert!(has_ingress(&some));
        assert_eq!(ingress_addresses(&some), vec!["lb.example.com".to_string(), "10.0.0.7".to_string()]);
    }

    #[test]
    fn subsets_absent_or_empty_means_no_backends() {
        let ep: Endpoints = serde_json::from_value(serde_json::json!({ "metadata": { "name": "web" } })).unwrap();
        assert!(!has_subsets(&ep));
        assert_eq!(object_name(&ep), Some("web"));
        let ep: Endpoints = serde_json::from_value(serde_json::json!({
            "metadata": { "name": "web" },
            "subsets": [ { "addresses": [ { "ip": "10.1.2.3" } ] } ]
        }))
        .unwrap();
        assert!(has_subsets(&ep));
    }
}
