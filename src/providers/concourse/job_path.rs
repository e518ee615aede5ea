use std::fmt;
use std::str::FromStr;

use crate::error::{BuildLensError, Result};

pub const JOB_PATH_FORMAT: &str = "teamName/pipelineName/jobName";

/// A `team/pipeline/job` triple identifying a Concourse job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobPath {
    pub team: String,
    pub pipeline: String,
    pub job: String,
}

impl JobPath {
    /// Parses a job path of the form `team/pipeline/job`.
    ///
    /// Segments are taken verbatim: no trimming and no escaping, so a segment can
    /// never contain a `/`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildLensError::InvalidIdentifier`] unless the value splits into
    /// exactly three non-empty segments.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || BuildLensError::InvalidIdentifier {
            value: value.to_string(),
            expected: JOB_PATH_FORMAT,
        };

        let parts: Vec<&str> = value.split('/').collect();
        let [team, pipeline, job] = parts.as_slice() else {
            return Err(invalid());
        };

        if team.is_empty() || pipeline.is_empty() || job.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            team: (*team).to_string(),
            pipeline: (*pipeline).to_string(),
            job: (*job).to_string(),
        })
    }
}

impl FromStr for JobPath {
    type Err = BuildLensError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for JobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.team, self.pipeline, self.job)
    }
}

/// A single build of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildRef {
    pub job_path: JobPath,
    pub build_number: u64,
}

impl BuildRef {
    pub fn new(job_path: JobPath, build_number: u64) -> Self {
        Self {
            job_path,
            build_number,
        }
    }
}
