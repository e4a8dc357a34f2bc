//! Telemetry events for bootstrap runs
//!
//! Every lifecycle event of an initializer run is emitted as one structured
//! log record carrying a stable `event` code, so log-based alerting can match
//! on it without parsing messages.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// All telemetry events an initializer run can emit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    /// Component started
    ComponentStarted { component: String, version: String },

    /// Bootstrap invocation started
    BootstrapStarted { invocation_id: String },

    /// A database connection was opened (first use or after the previous one closed)
    ConnectionOpened { invocation_id: String, reopened: bool },

    /// Bootstrap completed successfully
    BootstrapCompleted {
        invocation_id: String,
        duration_ms: u64,
        roles: Vec<String>,
        secrets_published: Vec<String>,
    },

    /// Bootstrap failed
    BootstrapFailed {
        invocation_id: String,
        error: String,
        phase: String,
    },
}

impl TelemetryEvent {
    /// Get the event type name for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ComponentStarted { .. } => "COMPONENT_STARTED",
            Self::BootstrapStarted { .. } => "DB_BOOTSTRAP_STARTED",
            Self::ConnectionOpened { .. } => "DB_CONNECTION_OPENED",
            Self::BootstrapCompleted { .. } => "DB_BOOTSTRAP_COMPLETED",
            Self::BootstrapFailed { .. } => "DB_BOOTSTRAP_FAILED",
        }
    }

    /// Convert event to a human-readable message.
    pub fn message(&self) -> String {
        match self {
            Self::ComponentStarted { component, version } => {
                format!("{} v{} started", component, version)
            }
            Self::BootstrapStarted { invocation_id } => {
                format!("Bootstrap {} started", invocation_id)
            }
            Self::ConnectionOpened {
                invocation_id,
                reopened,
            } => {
                if *reopened {
                    format!("Bootstrap {} reopened a closed connection", invocation_id)
                } else {
                    format!("Bootstrap {} opened a connection", invocation_id)
                }
            }
            Self::BootstrapCompleted {
                invocation_id,
                duration_ms,
                ..
            } => {
                format!("Bootstrap {} completed in {}ms", invocation_id, duration_ms)
            }
            Self::BootstrapFailed {
                invocation_id,
                error,
                phase,
            } => {
                format!(
                    "Bootstrap {} failed during {}: {}",
                    invocation_id, phase, error
                )
            }
        }
    }

    fn is_failure(&self) -> bool {
        matches!(self, Self::BootstrapFailed { .. })
    }
}

/// Emits telemetry events for one component.
#[derive(Debug, Clone)]
pub struct Telemetry {
    component: String,
}

impl Telemetry {
    /// Create a telemetry emitter for `component`.
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
        }
    }

    /// Emit an event as a structured log record.
    ///
    /// The serialized event is attached as `metadata`. Failures log at ERROR,
    /// everything else at INFO.
    pub fn send(&self, event: TelemetryEvent) {
        let event_type = event.event_type();
        let message = event.message();
        let metadata = serde_json::to_string(&event).unwrap_or_default();

        if event.is_failure() {
            error!(component = %self.component, event = %event_type, %metadata, "{}", message);
        } else {
            info!(component = %self.component, event = %event_type, %metadata, "{}", message);
        }
    }
}
