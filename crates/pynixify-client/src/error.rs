use std::path::PathBuf;

use pep508_rs::PackageName;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
    /// The package was not found in the registry.
    ///
    /// Make sure the package name is spelled correctly.
    #[error("Package `{0}` was not found on PyPI")]
    PackageNotFound(PackageName),

    /// The package exists, but none of its buildable releases satisfies the requirement.
    #[error("No version of `{name}` on PyPI satisfies `{requirement}`")]
    NoMatchingVersionFound {
        name: PackageName,
        requirement: String,
    },

    /// The distribution file was never downloaded into the cache.
    #[error("File `{filename}` is not available in the cache (from {url})")]
    FileNotCached { filename: String, url: Url },

    #[error("Received some unexpected JSON from `{}`", path.display())]
    BadJson {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn from_json_err(err: serde_json::Error, path: PathBuf) -> Self {
        Self::BadJson { source: err, path }
    }
}
