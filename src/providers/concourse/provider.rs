use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info};

use super::client::ConcourseClient;
use super::discovery::ResourceFilter;
use super::job_path::{BuildRef, JobPath};
use super::links::build_url;
use super::merge::merge_metadata;
use super::revision::extract_revision;
use super::synchronizer::{synchronize, Interrupt, SyncOptions};
use super::types::{BuildListingEntry, Job, Metadata, Pipeline, Team};
use crate::auth::{Credentials, Token};
use crate::config::ConcourseConfig;
use crate::error::{BuildLensError, Result};
use crate::output::PhaseProgress;
use crate::record::{BuildRecord, BuildStatus, Revision};

/// Concourse build service.
///
/// Resolves builds of one Concourse host into [`BuildRecord`]s, including the
/// source revision and the metadata reported by the build's resources.
pub struct ConcourseProvider {
    pub(super) client: ConcourseClient,
    pub(super) filter: ResourceFilter,
    config: ConcourseConfig,
    interrupt: Arc<Interrupt>,
}

impl ConcourseProvider {
    /// Creates a provider for the configured host.
    ///
    /// # Errors
    ///
    /// Returns an error if the host URL or the resource filter regex is invalid.
    pub fn new(config: ConcourseConfig) -> Result<Self> {
        let token = config.token.as_deref().map(Token::from);
        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        let client = ConcourseClient::new(&config.url, token, credentials)?;
        let filter = ResourceFilter::new(config.resource_filter_regex.as_deref())?;

        Ok(Self {
            client,
            filter,
            config,
            interrupt: Arc::new(Interrupt::new()),
        })
    }

    pub fn master_name(&self) -> String {
        format!("concourse-{}", self.config.name)
    }

    /// Handle that ends any metadata wait, in progress or started later, once
    /// triggered.
    pub fn interrupt_handle(&self) -> Arc<Interrupt> {
        Arc::clone(&self.interrupt)
    }

    pub async fn authenticate(&self) -> Result<()> {
        self.client.ensure_authenticated().await
    }

    pub async fn teams(&self) -> Result<Vec<Team>> {
        self.client.refresh_token_if_necessary().await?;
        let teams = self.client.teams().await?;
        Ok(teams
            .into_iter()
            .filter(|team| self.config.includes_team(&team.name))
            .collect())
    }

    pub async fn pipelines(&self) -> Result<Vec<Pipeline>> {
        self.client.refresh_token_if_necessary().await?;
        let pipelines = self.client.pipelines().await?;
        Ok(pipelines
            .into_iter()
            .filter(|pipeline| self.config.includes_team(&pipeline.team_name))
            .collect())
    }

    pub async fn jobs(&self) -> Result<Vec<Job>> {
        self.client.refresh_token_if_necessary().await?;
        let jobs = self.client.jobs().await?;
        Ok(jobs
            .into_iter()
            .filter(|job| self.config.includes_team(&job.team_name))
            .collect())
    }

    /// Lists the recent succeeded builds of a job.
    ///
    /// Jobs of teams outside the configured scope have no builds.
    pub async fn get_builds(&self, job_path: &str, since: Option<u64>) -> Result<Vec<BuildListingEntry>> {
        let job_path = JobPath::parse(job_path)?;

        if !self.config.includes_team(&job_path.team) {
            debug!("Team {} is outside the configured teams", job_path.team);
            return Ok(Vec::new());
        }

        let builds = self
            .client
            .builds(&job_path, self.config.build_lookback_limit, since)
            .await?;

        Ok(builds.into_iter().filter(BuildListingEntry::is_succeeded).collect())
    }

    /// Resolves a build by number, with its revision and properties.
    ///
    /// Returns `None` when no succeeded build with that number is listed.
    pub async fn get_build(&self, job_path: &str, build_number: u64) -> Result<Option<BuildRecord>> {
        let progress = PhaseProgress::start_phase_1();
        let builds = match self.get_builds(job_path, None).await {
            Ok(builds) => builds,
            Err(e) => {
                progress.fail(&e);
                return Err(e);
            }
        };
        let progress = progress.finish_phase_1_start_phase_2(builds.len());

        let Some(entry) = builds.iter().find(|b| b.number == build_number) else {
            progress.finish_not_found(build_number);
            info!("No succeeded build {build_number} found for {job_path}");
            return Ok(None);
        };

        match self.resolve_build(job_path, entry, true).await {
            Ok(record) => {
                progress.finish_phase_2();
                Ok(Some(record))
            }
            Err(e) => {
                progress.fail(&e);
                Err(e)
            }
        }
    }

    /// Assembles the build record of a listed build.
    ///
    /// With `fetch_resources` unset only identity, status, display name and URL
    /// are filled in; otherwise the build's resources are discovered, their
    /// metadata is read from the event stream and merged, and the `git` resource
    /// becomes the revision.
    pub async fn resolve_build(
        &self,
        job_path: &str,
        entry: &BuildListingEntry,
        fetch_resources: bool,
    ) -> Result<BuildRecord> {
        let job_path = JobPath::parse(job_path)?;
        let display_name = job_path.to_string();
        let url = build_url(
            self.client.host_url(),
            &BuildRef::new(job_path.clone(), entry.number),
        );

        let mut record = BuildRecord {
            id: entry.id.clone(),
            number: entry.number,
            status: BuildStatus::Succeeded,
            building: false,
            name: job_path.job,
            display_name,
            url,
            revisions: Vec::new(),
            properties: None,
        };

        if !fetch_resources {
            return Ok(record);
        }

        let (revision, properties) = self.resolve_resources(&entry.id).await?;
        record.revisions = revision.into_iter().collect();
        record.properties = (!properties.is_empty()).then_some(properties);

        Ok(record)
    }

    async fn resolve_resources(&self, build_id: &str) -> Result<(Option<Revision>, BTreeMap<String, Metadata>)> {
        let mut resources = self.discover_resources(build_id).await?;

        if !resources.is_empty() {
            let events = self.client.resource_events(build_id).await?;
            let options = SyncOptions {
                timeout: self.config.metadata_timeout(),
            };
            let report = synchronize(events, &mut resources, options, self.interrupt.wait()).await;
            if report.is_complete() {
                debug!("Build {build_id}: metadata for all {} resources", report.expected);
            } else {
                // Resources that never reported keep empty metadata.
                debug!(
                    "Build {build_id}: metadata for {}/{} resources ({:?})",
                    report.resolved, report.expected, report.outcome
                );
            }
        }

        let merged = merge_metadata(resources.values());
        extract_revision(resources.values(), merged)
    }

    /// Source revisions of a build, empty when the build is not found.
    pub async fn git_revisions(&self, job_path: &str, build_number: u64) -> Result<Vec<Revision>> {
        Ok(self
            .get_build(job_path, build_number)
            .await?
            .map(|build| build.revisions)
            .unwrap_or_default())
    }

    /// Resource metadata of a build, empty when the build is not found.
    pub async fn build_properties(&self, job_path: &str, build_number: u64) -> Result<BTreeMap<String, Metadata>> {
        Ok(self
            .get_build(job_path, build_number)
            .await?
            .and_then(|build| build.properties)
            .unwrap_or_default())
    }

    /// Builds cannot be triggered through this service.
    pub fn trigger_build(&self, job_path: &str, _parameters: &HashMap<String, String>) -> Result<u64> {
        Err(BuildLensError::UnsupportedOperation(format!(
            "Triggering concourse builds not supported ({job_path})"
        )))
    }
}
