use serde::{Deserialize, Serialize};

/// Free-form diagnostics that do not belong to a process or a probe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    Warning {
        message: String,
        context: Option<String>,
    },
    Error {
        message: String,
        details: Option<String>,
    },
}

impl GeneralEvent {
    /// Warning tied to something specific, e.g. the resource a unit gave up on
    pub fn warning_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: None,
        }
    }

    pub fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: Some(details.into()),
        }
    }
}
