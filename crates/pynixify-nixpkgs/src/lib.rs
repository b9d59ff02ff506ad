//! A read-only view of the Python packages nixpkgs already builds.
//!
//! The data comes from evaluating nixpkgs once and dumping every `python3Packages` attribute
//! that has a PyPI name, as a JSON object mapping a package name to its variants:
//!
//! ```json
//! {"pytest-runner": [{"attr": "pytestrunner", "pypiName": "pytest-runner", "version": "5.1"}]}
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use pep440_rs::Version;
use pep508_rs::{InvalidNameError, PackageName, Requirement};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use pynixify_types::{NixPackage, satisfies};

/// A single package derivation, as found in the nixpkgs dump.
#[derive(Debug, Clone, Deserialize)]
pub struct NixpkgsRecord {
    pub attr: String,
    #[serde(rename = "pypiName")]
    pub pypi_name: String,
    pub version: String,
    #[serde(default)]
    pub src: Option<String>,
}

/// Every pre-built variant of every Python package in nixpkgs, indexed by canonical name.
///
/// Different spellings of the same name (`A_B`, `a-b`) are merged into one list of variants.
#[derive(Debug, Default)]
pub struct NixpkgsData {
    packages: FxHashMap<PackageName, Vec<Arc<NixPackage>>>,
}

impl NixpkgsData {
    /// Index already parsed records.
    ///
    /// Records with a version that isn't valid PEP 440 can never satisfy a requirement and are
    /// skipped.
    pub fn from_records<I, S>(records: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (S, Vec<NixpkgsRecord>)>,
        S: AsRef<str>,
    {
        let mut packages: FxHashMap<PackageName, Vec<Arc<NixPackage>>> = FxHashMap::default();
        for (raw_name, variants) in records {
            let raw_name = raw_name.as_ref();
            let name = PackageName::from_str(raw_name).map_err(|err| Error::InvalidName {
                name: raw_name.to_string(),
                err,
            })?;
            for record in variants {
                let version = match Version::from_str(&record.version) {
                    Ok(version) => version,
                    Err(err) => {
                        warn!(
                            "Skipping nixpkgs attribute `{}` with invalid version `{}`: {err}",
                            record.attr, record.version
                        );
                        continue;
                    }
                };
                packages
                    .entry(name.clone())
                    .or_default()
                    .push(Arc::new(NixPackage {
                        attr: record.attr,
                        name: name.clone(),
                        pypi_name: record.pypi_name,
                        version,
                        src: record.src,
                    }));
            }
        }

        for variants in packages.values_mut() {
            variants.sort_by(|a, b| b.version.cmp(&a.version));
        }

        debug!("Indexed {} Python packages from nixpkgs", packages.len());
        Ok(Self { packages })
    }

    /// Parse the JSON dump of nixpkgs.
    pub fn from_json(content: &str) -> Result<Self, Error> {
        let records: BTreeMap<String, Vec<NixpkgsRecord>> = serde_json::from_str(content)?;
        Self::from_records(records)
    }

    /// Read the JSON dump of nixpkgs from a file.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let content = fs_err::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// All variants for a raw (not necessarily canonical) package name, highest version first.
    pub fn variants_for_name(&self, name: &str) -> Result<&[Arc<NixPackage>], Error> {
        let canonical =
            PackageName::from_str(name).map_err(|_| Error::PackageNotFound(name.to_string()))?;
        self.variants(&canonical)
    }

    /// All variants for a canonical package name, highest version first.
    pub fn variants(&self, name: &PackageName) -> Result<&[Arc<NixPackage>], Error> {
        self.packages
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }

    /// The variants that satisfy the version clauses of `requirement`, highest version first.
    ///
    /// An empty list means nixpkgs knows the package but none of its versions match; only a
    /// package nixpkgs doesn't know at all is an error.
    pub fn variants_for_requirement(
        &self,
        requirement: &Requirement,
    ) -> Result<Vec<Arc<NixPackage>>, Error> {
        Ok(self
            .variants(&requirement.name)?
            .iter()
            .filter(|variant| satisfies(requirement, &variant.version))
            .cloned()
            .collect())
    }

    /// Returns `true` if nixpkgs has at least one variant of the package.
    pub fn contains(&self, name: &PackageName) -> bool {
        self.packages.contains_key(name)
    }

    /// The number of distinct canonical names.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Package `{0}` is not available in nixpkgs")]
    PackageNotFound(String),

    #[error("Invalid package name `{name}` in the nixpkgs data")]
    InvalidName {
        name: String,
        #[source]
        err: InvalidNameError,
    },

    #[error("Failed to parse the nixpkgs data")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests;
