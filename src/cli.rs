use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::config::{Config, OutputFormat};
use crate::output::{
    export_json, print_build, print_builds, print_jobs, print_pipelines, print_properties,
    print_revisions, print_teams,
};
use crate::providers::ConcourseProvider;

#[derive(Parser)]
#[command(name = "buildlens")]
#[command(author, version, about = "Concourse Build Resolver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./buildlens.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Concourse web URL
    #[arg(short, long, global = true, env = "CONCOURSE_URL")]
    url: Option<String>,

    #[arg(short, long, global = true, env = "CONCOURSE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, global = true, env = "CONCOURSE_USERNAME")]
    username: Option<String>,

    #[arg(long, global = true, env = "CONCOURSE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Write JSON output to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the teams in scope
    Teams,

    /// List the pipelines of the teams in scope
    Pipelines,

    /// List the jobs of the teams in scope
    Jobs,

    /// List the recent succeeded builds of a job
    Builds {
        /// Job path, `team/pipeline/job`
        job_path: String,

        /// Only builds with an ID greater than this one
        #[arg(short, long)]
        since: Option<u64>,
    },

    /// Resolve a build with its revision and resource metadata
    Build { job_path: String, number: u64 },

    /// Show the git revision of a build
    Revisions { job_path: String, number: u64 },

    /// Show the resource metadata of a build
    Properties { job_path: String, number: u64 },

    /// Trigger a new build of a job
    Trigger {
        job_path: String,

        /// Build parameter, `key=value`
        #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },
}

/// Resolved output settings: CLI flags win over the configuration file.
struct OutputSettings {
    format: OutputFormat,
    pretty: bool,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        let concourse = &mut config.concourse;
        if let Some(url) = &self.url {
            concourse.url.clone_from(url);
        }
        if self.token.is_some() {
            concourse.token.clone_from(&self.token);
        }
        if self.username.is_some() {
            concourse.username.clone_from(&self.username);
        }
        if self.password.is_some() {
            concourse.password.clone_from(&self.password);
        }

        Ok(config)
    }

    fn emit<T>(&self, settings: &OutputSettings, value: &T, print_summary: impl FnOnce(&T)) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if let Some(output_path) = &self.output {
            let file = File::create(output_path).with_context(|| {
                format!("Failed to create output file: {}", output_path.display())
            })?;
            let mut writer = BufWriter::new(file);
            export_json(value, settings.pretty, &mut writer)?;
            writer.flush()?;
            info!("Results written to: {}", output_path.display());
            return Ok(());
        }

        match settings.format {
            OutputFormat::Summary => print_summary(value),
            OutputFormat::Json => export_json(value, settings.pretty, &mut std::io::stdout().lock())?,
        }

        Ok(())
    }

    async fn run(&self, provider: &ConcourseProvider, settings: &OutputSettings) -> Result<()> {
        match &self.command {
            Commands::Teams => {
                let teams = provider.teams().await?;
                self.emit(settings, teams.as_slice(), print_teams)
            }
            Commands::Pipelines => {
                let pipelines = provider.pipelines().await?;
                self.emit(settings, pipelines.as_slice(), print_pipelines)
            }
            Commands::Jobs => {
                let jobs = provider.jobs().await?;
                self.emit(settings, jobs.as_slice(), print_jobs)
            }
            Commands::Builds { job_path, since } => {
                let builds = provider.get_builds(job_path, *since).await?;
                self.emit(settings, builds.as_slice(), |builds| {
                    print_builds(job_path, builds);
                })
            }
            Commands::Build { job_path, number } => {
                let record = provider
                    .get_build(job_path, *number)
                    .await?
                    .ok_or_else(|| anyhow!("No succeeded build #{number} found for {job_path}"))?;
                self.emit(settings, &record, print_build)
            }
            Commands::Revisions { job_path, number } => {
                let revisions = provider.git_revisions(job_path, *number).await?;
                self.emit(settings, revisions.as_slice(), print_revisions)
            }
            Commands::Properties { job_path, number } => {
                let properties = provider.build_properties(job_path, *number).await?;
                self.emit(settings, &properties, print_properties)
            }
            Commands::Trigger { job_path, params } => {
                let params: HashMap<String, String> = params.iter().cloned().collect();
                let number = provider.trigger_build(job_path, &params)?;
                info!("Triggered build #{number} of {job_path}");
                Ok(())
            }
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let config = self.load_config()?;
        let settings = OutputSettings {
            format: self.format.unwrap_or(config.output.format),
            pretty: self.pretty || config.output.pretty,
        };

        let provider =
            ConcourseProvider::new(config.concourse).context("Failed to set up Concourse provider")?;
        info!("Resolving builds on {}", provider.master_name());

        // First Ctrl-C ends metadata waits, the next one exits.
        let interrupt = provider.interrupt_handle();
        let ctrl_c = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if interrupt.is_triggered() {
                    warn!("Interrupted again, exiting");
                    std::process::exit(130);
                }
                warn!("Interrupted, continuing with the metadata received so far");
                interrupt.trigger();
            }
        });

        let result = match provider.authenticate().await {
            Ok(()) => self.run(&provider, &settings).await,
            Err(e) => Err(e.into()),
        };
        ctrl_c.abort();
        result
    }
}

fn parse_key_value(value: &str) -> std::result::Result<(String, String), String> {
    value
        .split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{value}`"))
}
