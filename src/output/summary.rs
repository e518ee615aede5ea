use std::fmt::Write;

use comfy_table::Cell;

use crate::providers::{BuildListingEntry, Job, Pipeline, Team};
use crate::record::{BuildRecord, Properties, Revision};

use super::styling::{bright, bright_green, bright_yellow, cyan, dim};
use super::tables::{create_table, cyan_header, optional_cell, status_cell};

/// Prints a human-readable view of a resolved build to stdout.
///
/// Shows the build overview, then one table for the source revision and one
/// table per resource with reported metadata.
pub fn print_build(record: &BuildRecord) {
    println!("{}", render_build(record));
}

pub fn print_builds(job_path: &str, builds: &[BuildListingEntry]) {
    println!("{}", render_builds(job_path, builds));
}

pub fn print_teams(teams: &[Team]) {
    let rows = teams.iter().map(|team| vec![team.name.clone()]).collect();
    println!("{}", render_listing("👥", "Teams", &["Team"], rows));
}

pub fn print_pipelines(pipelines: &[Pipeline]) {
    let rows = pipelines
        .iter()
        .map(|pipeline| vec![pipeline.team_name.clone(), pipeline.name.clone()])
        .collect();
    println!(
        "{}",
        render_listing("🧩", "Pipelines", &["Team", "Pipeline"], rows)
    );
}

pub fn print_jobs(jobs: &[Job]) {
    let rows = jobs
        .iter()
        .map(|job| {
            vec![
                format!("{}/{}/{}", job.team_name, job.pipeline_name, job.name),
                job.name.clone(),
            ]
        })
        .collect();
    println!("{}", render_listing("🛠️", "Jobs", &["Job Path", "Job"], rows));
}

pub fn print_revisions(revisions: &[Revision]) {
    let mut output = String::new();
    render_revisions(&mut output, revisions);
    println!("{output}");
}

pub fn print_properties(properties: &Properties) {
    let mut output = String::new();
    render_properties(&mut output, properties);
    println!("{output}");
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn render_build(record: &BuildRecord) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Build");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Job:"),
        cyan(&record.display_name),
        dim("Build:"),
        bright_yellow(format!("#{}", record.number)),
        dim("Build ID:"),
        dim(&record.id),
        dim("Status:"),
        bright_green(format!("{:?}", record.status).to_lowercase()),
        dim("URL:"),
        cyan(&record.url),
    );

    render_revisions(&mut output, &record.revisions);

    match &record.properties {
        Some(properties) => render_properties(&mut output, properties),
        None => {
            add_section_header(&mut output, "📦", "Properties");
            let _ = writeln!(output, "{}", bright_yellow("No resource metadata reported."));
        }
    }

    output
}

fn render_revisions(output: &mut String, revisions: &[Revision]) {
    add_section_header(output, "🌿", "Revision");

    if revisions.is_empty() {
        let _ = writeln!(output, "{}\n", bright_yellow("No git revision found."));
        return;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&[
        "SHA",
        "Branch",
        "Committer",
        "Committed",
        "Message",
    ]));

    for revision in revisions {
        let committed = revision
            .timestamp
            .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string());

        table.add_row(vec![
            optional_cell(revision.sha.as_deref()),
            optional_cell(revision.branch.as_deref()),
            optional_cell(revision.committer.as_deref()),
            optional_cell(committed.as_deref()),
            optional_cell(revision.message.as_deref()),
        ]);
    }

    let _ = writeln!(output, "{table}\n");
}

fn render_properties(output: &mut String, properties: &Properties) {
    add_section_header(output, "📦", "Properties");

    if properties.is_empty() {
        let _ = writeln!(output, "{}\n", bright_yellow("No resource metadata reported."));
        return;
    }

    for (resource, metadata) in properties {
        let _ = writeln!(output, "  {}", cyan(resource));

        let mut table = create_table();
        table.set_header(cyan_header(&["Key", "Value"]));
        for (key, value) in metadata {
            table.add_row(vec![Cell::new(key), Cell::new(value)]);
        }

        let _ = writeln!(output, "{table}\n");
    }
}

fn render_builds(job_path: &str, builds: &[BuildListingEntry]) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "🏗️", "Succeeded Builds");
    let _ = writeln!(output, "  {} {}\n", dim("Job:"), cyan(job_path));

    if builds.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No succeeded builds found."));
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&["Build", "Build ID", "Status"]));
    for build in builds {
        table.add_row(vec![
            Cell::new(format!("#{}", build.number)),
            Cell::new(&build.id),
            status_cell(&build.status),
        ]);
    }

    let _ = writeln!(output, "{table}");
    output
}

fn render_listing(emoji: &str, title: &str, header: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut output = String::new();
    add_section_header(&mut output, emoji, title);

    if rows.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow(format!("No {} found.", title.to_lowercase())));
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(header));
    for row in rows {
        table.add_row(row);
    }

    let _ = writeln!(output, "{table}");
    output
}
