use std::time::Duration;

use pep440_rs::Version;
use pep508_rs::{InvalidNameError, PackageName};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Neither nixpkgs nor PyPI know the package.
    #[error("Package `{0}` was not found in nixpkgs or on PyPI")]
    PackageNotFound(PackageName),

    /// The package is known, but no version satisfies the requirement. If a version was already
    /// chosen for the package, it's the one that conflicts.
    #[error(
        "No version of `{name}` satisfies `{requirement}`{}",
        .chosen.as_ref().map(|version| format!(" (version {version} was already chosen)")).unwrap_or_default()
    )]
    NoMatchingVersionFound {
        name: PackageName,
        requirement: String,
        chosen: Option<Version>,
    },

    #[error("Can't use a local source for `{name}`: {chosen} was already chosen")]
    LocalOverride { name: PackageName, chosen: String },

    #[error("Timed out after {timeout:?} while {action}")]
    Timeout { action: String, timeout: Duration },

    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),

    #[error(transparent)]
    Client(pynixify_client::Error),

    #[error(transparent)]
    Nixpkgs(pynixify_nixpkgs::Error),
}

impl ResolveError {
    /// Returns `true` if the error means no package could be chosen for a requirement, as
    /// opposed to a requirement contradicting a package that was already chosen.
    ///
    /// These are the failures that are dropped when they come from the declared requirements of
    /// a nixpkgs package.
    pub fn is_lookup_failure(&self) -> bool {
        match self {
            Self::PackageNotFound(_) | Self::Timeout { .. } | Self::Client(_) => true,
            Self::NoMatchingVersionFound { chosen, .. } => chosen.is_none(),
            Self::LocalOverride { .. } | Self::InvalidName(_) | Self::Nixpkgs(_) => false,
        }
    }
}

impl From<pynixify_client::Error> for ResolveError {
    fn from(err: pynixify_client::Error) -> Self {
        match err {
            pynixify_client::Error::PackageNotFound(name) => Self::PackageNotFound(name),
            pynixify_client::Error::NoMatchingVersionFound { name, requirement } => {
                Self::NoMatchingVersionFound {
                    name,
                    requirement,
                    chosen: None,
                }
            }
            err => Self::Client(err),
        }
    }
}

impl From<pynixify_nixpkgs::Error> for ResolveError {
    fn from(err: pynixify_nixpkgs::Error) -> Self {
        Self::Nixpkgs(err)
    }
}
