use std::path::PathBuf;

use clap::Parser;
use pep508_rs::Requirement;

#[derive(Parser)]
#[command(author, version, about)]
pub(crate) struct Cli {
    /// The requirements to resolve, e.g. `flask>=1.1`.
    pub(crate) requirements: Vec<Requirement>,

    /// A JSON dump of the Python packages in nixpkgs.
    #[arg(long, env = "PYNIXIFY_NIXPKGS")]
    pub(crate) nixpkgs: Option<PathBuf>,

    /// The directory holding PyPI metadata (`<name>.json`) and downloaded sources (`files/`).
    ///
    /// Without it, only packages from nixpkgs and local sources can be chosen.
    #[arg(long, env = "PYNIXIFY_CACHE_DIR")]
    pub(crate) cache_dir: Option<PathBuf>,

    /// The Nix expression that extracts the requirements from a package source.
    #[arg(long)]
    pub(crate) nix_expression: Option<PathBuf>,

    /// Use a local source tree for a package, as `NAME=PATH`.
    #[arg(long, value_parser = parse_local)]
    pub(crate) local: Vec<(String, PathBuf)>,

    /// Resolve the test requirements of the given packages.
    #[arg(long, value_delimiter = ',', conflicts_with = "all_tests")]
    pub(crate) tests: Vec<String>,

    /// Resolve the test requirements of every package taken from PyPI.
    #[arg(long)]
    pub(crate) all_tests: bool,

    /// The Python version to evaluate markers for, e.g. `3.11`.
    #[arg(long)]
    pub(crate) python_version: Option<String>,

    /// Give up on a single requirement evaluation or PyPI lookup after this many seconds.
    #[arg(long)]
    pub(crate) timeout: Option<u64>,

    /// Read settings from this file instead of `pynixify.toml` in the current directory.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Write the resolution to this file instead of stdout.
    #[arg(long, short)]
    pub(crate) output: Option<PathBuf>,

    /// Use verbose output. Repeat for more.
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
}

fn parse_local(value: &str) -> Result<(String, PathBuf), String> {
    let Some((name, path)) = value.split_once('=') else {
        return Err(format!("Expected `NAME=PATH`, got `{value}`"));
    };
    let name = name.trim();
    if name.is_empty() || path.is_empty() {
        return Err(format!("Expected `NAME=PATH`, got `{value}`"));
    }
    Ok((name.to_string(), PathBuf::from(path)))
}
