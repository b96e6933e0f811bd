//! Resource pool error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PoolError {
    #[error("process P{process} released R{resource} but is not its holder (holder: {})", fmt_holder(.holder))]
    NotHolder {
        resource: u32,
        process: u32,
        holder: Option<u32>,
    },

    #[error("process P{process} already holds R{resource}")]
    AlreadyHolder { resource: u32, process: u32 },

    #[error("unknown resource R{resource}")]
    UnknownResource { resource: u32 },
}

#[allow(clippy::ref_option)]
fn fmt_holder(holder: &Option<u32>) -> String {
    match holder {
        Some(process) => format!("P{process}"),
        None => "none".to_string(),
    }
}

impl UserFacingError for PoolError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotHolder { .. } => {
                Some("A unit released a resource it did not own; the run was aborted.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::NotHolder { .. } => "pool.not_holder",
            Self::AlreadyHolder { .. } => "pool.already_holder",
            Self::UnknownResource { .. } => "pool.unknown_resource",
        })
    }
}
