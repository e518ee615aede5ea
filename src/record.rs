use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build properties keyed by resource name, then by metadata key.
pub type Properties = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Succeeded,
}

/// Source-control revision a build ran against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub committer: Option<String>,
    pub branch: Option<String>,
    /// Display name of the revision, same value as `branch`
    pub name: Option<String>,
    pub message: Option<String>,
    pub sha: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A resolved, provider-agnostic build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: String,
    pub number: u64,
    pub status: BuildStatus,
    pub building: bool,
    /// Job name
    pub name: String,
    /// `team/pipeline/job`
    pub display_name: String,
    pub url: String,
    #[serde(default)]
    pub revisions: Vec<Revision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}
