use super::job_path::BuildRef;

/// Builds the web UI URL of a Concourse build.
///
/// # Arguments
///
/// * `host_url` - Concourse host base URL (e.g., <https://ci.example.com>)
/// * `build` - Job path and build number
///
/// # Returns
///
/// Clickable URL to the build (e.g., <https://ci.example.com/teams/main/pipelines/app/jobs/test/builds/42>)
pub fn build_url(host_url: &str, build: &BuildRef) -> String {
    let job_path = &build.job_path;
    format!(
        "{}/teams/{}/pipelines/{}/jobs/{}/builds/{}",
        host_url.trim_end_matches('/'),
        job_path.team,
        job_path.pipeline,
        job_path.job,
        build.build_number
    )
}
