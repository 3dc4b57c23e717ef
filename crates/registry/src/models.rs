//! Deployment lifecycle status and the record reported to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use store::ChecksumSet;

/// Lifecycle status of a workflow id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    /// Schema constructed, not yet validated.
    Draft,
    Validated,
    /// Artifacts written to disk.
    Generated,
    /// Registered in the live system.
    Deployed,
    /// Registration and artifacts removed; the id is free again.
    TornDown,
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft     => write!(f, "DRAFT"),
            Self::Validated => write!(f, "VALIDATED"),
            Self::Generated => write!(f, "GENERATED"),
            Self::Deployed  => write!(f, "DEPLOYED"),
            Self::TornDown  => write!(f, "TORN_DOWN"),
        }
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT"     => Ok(Self::Draft),
            "VALIDATED" => Ok(Self::Validated),
            "GENERATED" => Ok(Self::Generated),
            "DEPLOYED"  => Ok(Self::Deployed),
            "TORN_DOWN" => Ok(Self::TornDown),
            other       => Err(format!("unknown deployment status: {other}")),
        }
    }
}

/// Snapshot of one workflow's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub workflow_id: String,
    /// Checksums of the last written artifacts; empty before the first generate.
    pub checksums: ChecksumSet,
    pub status: DeploymentStatus,
    /// When `status` last changed.
    pub updated_at: DateTime<Utc>,
}
