mod concourse;

pub use concourse::{BuildListingEntry, ConcourseProvider, Job, Pipeline, Team};
