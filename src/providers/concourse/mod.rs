mod client;
mod discovery;
mod job_path;
mod links;
mod merge;
mod provider;
mod revision;
mod synchronizer;
mod types;

pub use provider::ConcourseProvider;
pub use types::{BuildListingEntry, Job, Pipeline, Team};
