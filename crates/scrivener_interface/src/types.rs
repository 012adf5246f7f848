//! Core type definitions for the Scrivener interface.

use serde::Serialize;

/// Information about the model behind a generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelMetadata {
    /// Provider name (e.g., "openai", "mock")
    pub provider: &'static str,
    /// Model identifier (e.g., "gpt-4")
    pub model: String,
    /// Request timeout in seconds, when the backend has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Artificial latency in milliseconds, for simulated backends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

/// Health status of the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum HealthStatus {
    /// System is fully operational
    Healthy,
    /// System is not operational
    Unhealthy {
        /// Description of the problem
        message: String,
    },
}

impl HealthStatus {
    /// True for [`HealthStatus::Healthy`].
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}
