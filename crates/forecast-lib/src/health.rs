//! Health tracking for the predictor daemon
//!
//! The tailer and predictor report their state here; the HTTP endpoint
//! reads it back. The daemon is ready once the existing log has been
//! primed into the device histories and no component is unhealthy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still running, e.g. waiting for the log file to appear
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn with(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::with(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status across all components
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const TAILER: &str = "tailer";
    pub const PREDICTOR: &str = "predictor";
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<String, ComponentHealth>,
    primed: bool,
}

/// Shared, cloneable view of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Reflect the latest tailer poll: `Ok(file_present)` or the read error
    pub async fn observe_tail(&self, path: &Path, outcome: &io::Result<bool>) {
        let health = match outcome {
            Ok(true) => ComponentHealth::healthy(),
            Ok(false) => {
                ComponentHealth::degraded(format!("log file {} not present", path.display()))
            }
            Err(e) => ComponentHealth::unhealthy(format!("reading {}: {}", path.display(), e)),
        };
        self.update(components::TAILER, health).await;
    }

    /// Record that the existing log has been loaded into the histories
    pub async fn mark_primed(&self) {
        self.state.write().await.primed = true;
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse {
            status,
            components: state.components.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let failing = state
            .components
            .iter()
            .find(|(_, c)| !c.status.is_operational());

        let reason = if !state.primed {
            Some("history not yet primed from the existing log".to_string())
        } else {
            failing.map(|(name, _)| format!("component {} is unhealthy", name))
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy_but_not_ready() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.unwrap().contains("primed"));
    }

    #[tokio::test]
    async fn test_worst_component_wins() {
        let registry = HealthRegistry::new();
        registry.register(components::TAILER).await;
        registry.register(components::PREDICTOR).await;

        registry.set_degraded(components::TAILER, "log file missing").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.set_unhealthy(components::PREDICTOR, "failed").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_observe_tail_outcomes() {
        let registry = HealthRegistry::new();
        let path = Path::new("heart_rate_log.csv");

        registry.observe_tail(path, &Ok(false)).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.components[components::TAILER]
            .message
            .as_deref()
            .unwrap()
            .contains("not present"));

        registry.observe_tail(path, &Ok(true)).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        let failed = Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        registry.observe_tail(path, &failed).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_ready_after_priming_unless_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::TAILER).await;
        registry.mark_primed().await;
        assert!(registry.readiness().await.ready);

        // a missing log file does not make the daemon unready
        registry.set_degraded(components::TAILER, "log file missing").await;
        assert!(registry.readiness().await.ready);

        registry.set_unhealthy(components::TAILER, "read failed").await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.unwrap().contains("tailer"));
    }
}
