use std::path::PathBuf;

use serde::Serialize;
use url::Url;

use pynixify_types::{Package, PypiSource, RequirementEvaluator};

use crate::{ChosenPackageRequirements, ResolveError, VersionChooser};

/// The outcome of a resolution: every package that needs a build definition, with the packages
/// its definition depends on.
///
/// Packages chosen from nixpkgs don't need a definition and only appear as dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub packages: Vec<ResolvedPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
    pub source: ResolvedSource,
    pub dependencies: Vec<Dependency>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResolvedSource {
    Local {
        path: PathBuf,
    },
    Registry {
        url: Url,
        #[serde(skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
    },
}

/// A reference to another chosen package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum Dependency {
    /// An attribute of `python3Packages`.
    Nixpkgs { attr: String },
    /// Another package of the resolution.
    Pypi { name: String },
}

impl From<&Package> for Dependency {
    fn from(package: &Package) -> Self {
        match package {
            Package::Nixpkgs(package) => Self::Nixpkgs {
                attr: package.attr.clone(),
            },
            Package::Pypi(package) => Self::Pypi {
                name: package.name.to_string(),
            },
        }
    }
}

impl Resolution {
    /// Collect the chosen PyPI packages, re-evaluating their requirements to find their
    /// dependencies.
    pub async fn from_chooser<E: RequirementEvaluator>(
        chooser: &VersionChooser<'_, E>,
    ) -> Result<Self, ResolveError> {
        let mut packages = Vec::new();
        for package in chooser.all_pypi_packages() {
            let Some(pypi) = package.as_pypi() else {
                continue;
            };
            let requirements = chooser.requirements(package).await?;
            let load_tests = chooser.options().load_tests.should_load(package.name());
            let chosen =
                ChosenPackageRequirements::from_package_requirements(&requirements, chooser, load_tests);

            let source = match &pypi.source {
                PypiSource::Local(path) => ResolvedSource::Local { path: path.clone() },
                PypiSource::Registry(file) => ResolvedSource::Registry {
                    url: file.url.clone(),
                    sha256: file.digests.sha256.clone(),
                },
            };

            packages.push(ResolvedPackage {
                name: pypi.name.to_string(),
                version: pypi.version.to_string(),
                source,
                dependencies: chosen.runtime_requirements.iter().map(Dependency::from).collect(),
                test_dependencies: chosen.test_requirements.iter().map(Dependency::from).collect(),
            });
        }
        Ok(Self { packages })
    }
}
