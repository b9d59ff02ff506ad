use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use pep508_rs::{InvalidNameError, PackageName};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use pynixify_resolver::LoadTests;

use crate::cli::Cli;

pub(crate) const CONFIG_FILE: &str = "pynixify.toml";

/// The contents of a `pynixify.toml` file.
///
/// Relative paths are relative to the directory containing the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct Options {
    pub(crate) nixpkgs: Option<PathBuf>,
    pub(crate) cache_dir: Option<PathBuf>,
    pub(crate) nix_expression: Option<PathBuf>,
    pub(crate) python_version: Option<String>,
    pub(crate) load_tests: Option<LoadTestsOption>,
    /// Local source trees by package name.
    pub(crate) local: Option<BTreeMap<String, PathBuf>>,
    /// In seconds.
    pub(crate) timeout: Option<u64>,
}

/// Either `true`/`false`, or the packages to load test requirements for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum LoadTestsOption {
    All(bool),
    Packages(Vec<String>),
}

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to parse: `{}`", _0.display())]
    Toml(PathBuf, #[source] Box<toml::de::Error>),

    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),

    #[error("No nixpkgs data given: pass `--nixpkgs` or set `nixpkgs` in `{CONFIG_FILE}`")]
    MissingNixpkgs,

    #[error(
        "No Nix expression for evaluating requirements given: pass `--nix-expression` or set `nix-expression` in `{CONFIG_FILE}`"
    )]
    MissingNixExpression,
}

impl Options {
    /// Read a settings file.
    pub(crate) fn from_file(path: &Path) -> Result<Self, Error> {
        debug!("Reading settings from `{}`", path.display());
        let content = fs_err::read_to_string(path)?;
        let options: Self =
            toml::from_str(&content).map_err(|err| Error::Toml(path.to_path_buf(), Box::new(err)))?;
        Ok(match std::path::absolute(path)?.parent() {
            Some(parent) => options.relative_to(parent),
            None => options,
        })
    }

    /// Read `pynixify.toml` from a directory, if there is one.
    pub(crate) fn from_directory(dir: &Path) -> Result<Option<Self>, Error> {
        let path = dir.join(CONFIG_FILE);
        match Self::from_file(&path) {
            Ok(options) => Ok(Some(options)),
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    #[must_use]
    fn relative_to(self, root: &Path) -> Self {
        let resolve = |path: Option<PathBuf>| path.map(|path| root.join(path));
        Self {
            nixpkgs: resolve(self.nixpkgs),
            cache_dir: resolve(self.cache_dir),
            nix_expression: resolve(self.nix_expression),
            local: self.local.map(|local| {
                local
                    .into_iter()
                    .map(|(name, path)| (name, root.join(path)))
                    .collect()
            }),
            ..self
        }
    }
}

/// The settings of a run, from the command line and the settings file.
#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) nixpkgs: PathBuf,
    pub(crate) cache_dir: Option<PathBuf>,
    pub(crate) nix_expression: PathBuf,
    pub(crate) python_version: Option<String>,
    pub(crate) load_tests: LoadTests,
    pub(crate) local: Vec<(String, PathBuf)>,
    pub(crate) timeout: Option<Duration>,
}

impl Settings {
    /// Combine the command line with the settings file. The command line wins.
    pub(crate) fn resolve(cli: &Cli, options: Options) -> Result<Self, Error> {
        let nixpkgs = cli
            .nixpkgs
            .clone()
            .or(options.nixpkgs)
            .ok_or(Error::MissingNixpkgs)?;
        let nix_expression = cli
            .nix_expression
            .clone()
            .or(options.nix_expression)
            .ok_or(Error::MissingNixExpression)?;

        let load_tests = if cli.all_tests {
            LoadTests::All
        } else if !cli.tests.is_empty() {
            load_tests_for(&cli.tests)?
        } else {
            match options.load_tests {
                None | Some(LoadTestsOption::All(false)) => LoadTests::None,
                Some(LoadTestsOption::All(true)) => LoadTests::All,
                Some(LoadTestsOption::Packages(packages)) => load_tests_for(&packages)?,
            }
        };

        let mut local = options.local.unwrap_or_default();
        local.extend(cli.local.iter().cloned());

        Ok(Self {
            nixpkgs,
            cache_dir: cli.cache_dir.clone().or(options.cache_dir),
            nix_expression,
            python_version: cli.python_version.clone().or(options.python_version),
            load_tests,
            local: local.into_iter().collect(),
            timeout: cli.timeout.or(options.timeout).map(Duration::from_secs),
        })
    }
}

fn load_tests_for(names: &[String]) -> Result<LoadTests, Error> {
    let packages = names
        .iter()
        .map(|name| PackageName::from_str(name))
        .collect::<Result<FxHashSet<_>, _>>()?;
    Ok(LoadTests::Packages(packages))
}
