use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use pep508_rs::PackageName;
use rustc_hash::FxHashMap;
use tracing::trace;

use pynixify_types::{File, ProjectMetadata};

use crate::Error;

/// The storage behind a [`crate::PypiClient`].
///
/// How the data gets there (HTTP, a mirror, a fixture) is up to the implementation; the client
/// only memoizes what the cache returns for the duration of a run.
#[async_trait]
pub trait PypiCache: Send + Sync {
    /// The JSON document of a project, or `None` if the registry doesn't know the project.
    async fn project(&self, name: &PackageName) -> Result<Option<ProjectMetadata>, Error>;

    /// Make a distribution file available on disk and return its path.
    async fn file(&self, file: &File) -> Result<PathBuf, Error>;
}

/// A cache directory populated ahead of time.
///
/// Project documents live at `<root>/<name>.json`, named by canonical name, and distribution
/// files at `<root>/files/<filename>`.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    root: PathBuf,
}

impl DirectoryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PypiCache for DirectoryCache {
    async fn project(&self, name: &PackageName) -> Result<Option<ProjectMetadata>, Error> {
        let path = self.root.join(format!("{name}.json"));
        let content = match fs_err::tokio::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                trace!("No cached metadata for {name} at {}", path.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let metadata =
            serde_json::from_str(&content).map_err(|err| Error::from_json_err(err, path))?;
        Ok(Some(metadata))
    }

    async fn file(&self, file: &File) -> Result<PathBuf, Error> {
        let path = self.root.join("files").join(&file.filename);
        if fs_err::tokio::metadata(&path).await.is_ok() {
            Ok(path)
        } else {
            Err(Error::FileNotCached {
                filename: file.filename.clone(),
                url: file.url.clone(),
            })
        }
    }
}

/// An in-memory cache, for embedding fixed registry data.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    projects: FxHashMap<PackageName, ProjectMetadata>,
    files: FxHashMap<String, PathBuf>,
}

impl MemoryCache {
    #[must_use]
    pub fn with_project(mut self, name: PackageName, metadata: ProjectMetadata) -> Self {
        self.projects.insert(name, metadata);
        self
    }

    /// Register the on-disk location of a distribution file by filename.
    #[must_use]
    pub fn with_file(mut self, filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(filename.into(), path.into());
        self
    }
}

#[async_trait]
impl PypiCache for MemoryCache {
    async fn project(&self, name: &PackageName) -> Result<Option<ProjectMetadata>, Error> {
        Ok(self.projects.get(name).cloned())
    }

    async fn file(&self, file: &File) -> Result<PathBuf, Error> {
        self.files
            .get(&file.filename)
            .cloned()
            .ok_or_else(|| Error::FileNotCached {
                filename: file.filename.clone(),
                url: file.url.clone(),
            })
    }
}
