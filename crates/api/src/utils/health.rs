//! Health report for the `health` command

use serde::Serialize;

/// Overall health of a running context.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub is_healthy: bool,
    pub components: Vec<ComponentHealth>,
    /// Unix timestamp of the probe.
    pub timestamp: i64,
}

impl HealthReport {
    pub fn new(components: Vec<ComponentHealth>) -> Self {
        Self {
            is_healthy: components.iter().all(|c| c.is_healthy),
            components,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub is_healthy: bool,
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>, message: Option<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }
}
