use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use anstream::{eprintln, println};
use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing::{debug, instrument, warn};

use pynixify_build::{CachedEvaluator, NixBuildEvaluator};
use pynixify_client::{DirectoryCache, MemoryCache, PypiClient};
use pynixify_nixpkgs::NixpkgsData;
use pynixify_resolver::{Resolution, ResolverOptions, TargetEnvironment, VersionChooser};

use crate::cli::Cli;
use crate::logging::setup_logging;
use crate::settings::{Options, Settings};

mod cli;
mod logging;
mod settings;

fn read_options(cli: &Cli) -> Result<Options> {
    let options = match &cli.config {
        Some(path) => Options::from_file(path)?,
        None => Options::from_directory(Path::new("."))?.unwrap_or_default(),
    };
    Ok(options)
}

#[instrument(skip_all)]
async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::resolve(&cli, read_options(&cli)?)?;
    debug!("{settings:?}");

    let nixpkgs = NixpkgsData::from_path(&settings.nixpkgs).with_context(|| {
        format!(
            "Failed to read the nixpkgs packages from `{}`",
            settings.nixpkgs.display()
        )
    })?;
    debug!("Found {} Python packages in nixpkgs", nixpkgs.len());

    let pypi = if let Some(cache_dir) = &settings.cache_dir {
        PypiClient::new(DirectoryCache::new(cache_dir))
    } else {
        warn!("No cache directory given, only nixpkgs and local packages can be chosen");
        PypiClient::new(MemoryCache::default())
    };

    let target = settings
        .python_version
        .as_ref()
        .map(TargetEnvironment::python)
        .unwrap_or_default();
    let markers = target
        .markers()
        .with_context(|| format!("Invalid Python version: `{}`", target.python_version))?;
    let mut options = ResolverOptions::new(markers).with_load_tests(settings.load_tests);
    if let Some(timeout) = settings.timeout {
        options = options.with_timeout(timeout);
    }

    let evaluator = CachedEvaluator::new(NixBuildEvaluator::new(&settings.nix_expression, &pypi));
    let mut chooser = VersionChooser::new(&nixpkgs, &pypi, evaluator, options);

    for (name, path) in &settings.local {
        chooser
            .require_local(name, path)
            .await
            .with_context(|| format!("Failed to use `{}` for `{name}`", path.display()))?;
    }
    for requirement in &cli.requirements {
        chooser
            .require(requirement)
            .await
            .with_context(|| format!("Failed to resolve `{requirement}`"))?;
    }

    let resolution = Resolution::from_chooser(&chooser).await?;
    let json = serde_json::to_string_pretty(&resolution)?;
    if let Some(output) = &cli.output {
        fs_err::write(output, json + "\n")?;
    } else {
        #[allow(clippy::print_stdout)]
        {
            println!("{json}");
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let start = Instant::now();
    let result = run(cli).await;
    debug!("Took {}ms", start.elapsed().as_millis());
    if let Err(err) = result {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("{}", "pynixify failed".red().bold());
            for err in err.chain() {
                eprintln!("  {}: {}", "Caused by".red().bold(), err);
            }
        }
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
