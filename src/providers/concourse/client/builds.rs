use log::debug;
use serde::Deserialize;
use serde_json::Value;

use super::core::ConcourseClient;
use crate::error::Result;
use crate::providers::concourse::job_path::JobPath;
use crate::providers::concourse::types::{BuildListingEntry, Resource};

/// Build as returned by `GET .../jobs/{job}/builds`.
#[derive(Debug, Deserialize)]
struct BuildPayload {
    id: u64,
    /// Build number, or `number.rerun` for reruns (e.g., "12.1")
    name: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct PlanPayload {
    plan: Value,
}

impl ConcourseClient {
    /// Lists the most recent builds of a job.
    ///
    /// `since` is a build ID cursor: only builds with a greater ID are returned.
    pub async fn builds(
        &self,
        job_path: &JobPath,
        limit: usize,
        since: Option<u64>,
    ) -> Result<Vec<BuildListingEntry>> {
        let mut url = self.endpoint(&[
            "teams",
            &job_path.team,
            "pipelines",
            &job_path.pipeline,
            "jobs",
            &job_path.job,
            "builds",
        ])?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(since) = since {
                query.append_pair("since", &since.to_string());
            }
        }

        let payloads: Vec<BuildPayload> = self.get_json(url).await?;

        Ok(payloads
            .into_iter()
            .filter_map(|build| match build.name.parse::<u64>() {
                Ok(number) => Some(BuildListingEntry {
                    id: build.id.to_string(),
                    number,
                    status: build.status,
                }),
                Err(_) => {
                    debug!("Skipping build {} with non-numeric name {}", build.id, build.name);
                    None
                }
            })
            .collect())
    }

    /// Fetches the execution plan of a build and returns every `get` and `put` step
    /// as a resource, in plan order.
    pub async fn build_plan(&self, build_id: &str) -> Result<Vec<Resource>> {
        let url = self.endpoint(&["builds", build_id, "plan"])?;
        let payload: PlanPayload = self.get_json(url).await?;

        let mut resources = Vec::new();
        collect_plan_resources(&payload.plan, &mut resources);
        Ok(resources)
    }
}

/// Walks a plan tree depth-first, visiting a step before its nested steps.
fn collect_plan_resources(node: &Value, resources: &mut Vec<Resource>) {
    match node {
        Value::Object(fields) => {
            if let Some(id) = fields.get("id").and_then(Value::as_str) {
                for step in ["get", "put"] {
                    if let Some(resource) = fields.get(step).and_then(|s| plan_step_resource(id, s)) {
                        resources.push(resource);
                    }
                }
            }

            for value in fields.values() {
                collect_plan_resources(value, resources);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_plan_resources(item, resources);
            }
        }
        _ => {}
    }
}

fn plan_step_resource(id: &str, step: &Value) -> Option<Resource> {
    let name = step.get("name")?.as_str()?;
    let resource_type = step.get("type")?.as_str()?;
    Some(Resource::new(id, name, resource_type))
}
