use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Open-ended key/value metadata attached to a resource version.
pub type Metadata = BTreeMap<String, String>;

/// Resource type whose metadata is turned into a source revision.
pub const REVISION_RESOURCE_TYPE: &str = "git";

/// Build status accepted by the resolution pipeline.
pub const SUCCEEDED_STATUS: &str = "succeeded";

/// A resource referenced by a build plan.
///
/// Several resources may share a `name` when the same resource is used more than
/// once in a plan (e.g. a `put` followed by its implicit `get`); the `id` is unique
/// within one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Plan step ID assigned by Concourse (e.g., "6343a6a1")
    pub id: String,
    /// Resource name as declared in the pipeline
    pub name: String,
    /// Resource type (e.g., "git", "registry-image")
    pub resource_type: String,
    /// Metadata reported for this step, empty until the event stream delivers it
    pub metadata: Metadata,
}

impl Resource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            resource_type: resource_type.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn is_revision_source(&self) -> bool {
        self.resource_type == REVISION_RESOURCE_TYPE
    }
}

/// Metadata reported for one plan step on the build event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvent {
    pub resource_id: String,
    pub metadata: Metadata,
}

/// A build as returned by the job builds listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildListingEntry {
    /// Concourse build ID (global across the installation)
    pub id: String,
    /// Build number within its job
    pub number: u64,
    /// Build status (e.g., "succeeded", "failed", "aborted")
    pub status: String,
}

impl BuildListingEntry {
    pub fn is_succeeded(&self) -> bool {
        self.status == SUCCEEDED_STATUS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub team_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub pipeline_name: String,
    pub team_name: String,
}
