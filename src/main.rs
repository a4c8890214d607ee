use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tallyman::analysis::AnalysisRegistry;
use tallyman::analyst::Analyst;
use tallyman::importer::AdapterRegistry;
use tallyman::settings::Specification;

#[derive(Parser)]
#[command(name = "tallyman", about = "Generate accounting reports according to a specification file.")]
struct Cli {
    /// Path to a specification file to generate a report from.
    spec: PathBuf,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if !cli.spec.exists() {
        bail!("Could not find spec file {}", cli.spec.display());
    }
    let spec = Specification::load(&cli.spec)
        .with_context(|| format!("loading specification {}", cli.spec.display()))?;
    let analyst = Analyst::new(spec, AdapterRegistry::builtin(), AnalysisRegistry::builtin())?;
    analyst.run()?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
