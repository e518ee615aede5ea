use super::core::ConcourseClient;
use crate::error::Result;
use crate::providers::concourse::types::{Job, Pipeline, Team};

impl ConcourseClient {
    pub async fn teams(&self) -> Result<Vec<Team>> {
        let url = self.endpoint(&["teams"])?;
        self.get_json(url).await
    }

    pub async fn pipelines(&self) -> Result<Vec<Pipeline>> {
        let url = self.endpoint(&["pipelines"])?;
        self.get_json(url).await
    }

    pub async fn jobs(&self) -> Result<Vec<Job>> {
        let url = self.endpoint(&["jobs"])?;
        self.get_json(url).await
    }
}
