use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// When a consumed message is removed from the queue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Delete regardless of the processing outcome.
    #[default]
    Always,
    /// Delete only when processing returns without error; otherwise the message
    /// becomes visible again after the transport's visibility timeout.
    OnSuccess,
}

impl DeletionPolicy {
    pub fn should_delete(&self, processed: bool) -> bool {
        match self {
            DeletionPolicy::Always => true,
            DeletionPolicy::OnSuccess => processed,
        }
    }
}

impl Display for DeletionPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DeletionPolicy::Always => write!(f, "always"),
            DeletionPolicy::OnSuccess => write!(f, "on_success"),
        }
    }
}

impl FromStr for DeletionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(DeletionPolicy::Always),
            "on_success" | "on-success" => Ok(DeletionPolicy::OnSuccess),
            _ => Err(anyhow::anyhow!("Invalid deletion policy: {}", s)),
        }
    }
}

/// Whether consumed messages must carry trace headers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracePropagation {
    /// Missing trace headers fail the message.
    #[default]
    Required,
    /// Missing trace headers are tolerated and processing runs without a span.
    Optional,
}

impl Display for TracePropagation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TracePropagation::Required => write!(f, "required"),
            TracePropagation::Optional => write!(f, "optional"),
        }
    }
}

impl FromStr for TracePropagation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(TracePropagation::Required),
            "optional" => Ok(TracePropagation::Optional),
            _ => Err(anyhow::anyhow!("Invalid trace propagation mode: {}", s)),
        }
    }
}
