mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::export_json;
pub use progress::PhaseProgress;
pub use styling::{dim, magenta_bold};
pub use summary::{
    print_build, print_builds, print_jobs, print_pipelines, print_properties, print_revisions,
    print_teams,
};

/// Prints the `BuildLens` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔍 BuildLens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Concourse Build Resolver")
    );
}
