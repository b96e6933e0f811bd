//! Probe routing error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProbeError {
    #[error("no inbox registered for P{process}")]
    UnknownProcess { process: u32 },

    #[error("inbox of P{process} is closed")]
    InboxClosed { process: u32 },
}
