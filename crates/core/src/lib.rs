//! kready core types: resource identity, watch events and diagnostics.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod fields;

/// Namespace + name pair identifying the Service (and, by name, its Endpoints).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }

    /// Stable URN used when tagging diagnostics, e.g. `v1/Service:default/web`.
    pub fn urn(&self, kind_key: &str) -> String {
        format!("{}:{}/{}", kind_key, self.namespace, self.name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

/// One change notification from a watch stream.
#[derive(Debug, Clone)]
pub struct WatchEvent<K> {
    pub kind: EventType,
    pub object: K,
}

impl<K> WatchEvent<K> {
    pub fn added(object: K) -> Self { Self { kind: EventType::Added, object } }
    pub fn modified(object: K) -> Self { Self { kind: EventType::Modified, object } }
    pub fn deleted(object: K) -> Self { Self { kind: EventType::Deleted, object } }

    pub fn is_deleted(&self) -> bool { self.kind == EventType::Deleted }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// Receiver for human-facing progress messages. Best-effort: implementations
/// must not fail the caller.
pub trait DiagnosticSink: Send + Sync {
    fn log(&self, severity: Severity, urn: &str, message: &str);
}

/// Condensed view of a Warning event attached to an object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventSummary {
    pub reason: String,
    pub message: String,
    pub count: i32,
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
}

impl fmt::Display for EventSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count > 1 {
            write!(f, "[{}] {} (x{})", self.reason, self.message, self.count)
        } else {
            write!(f, "[{}] {}", self.reason, self.message)
        }
    }
}
