use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use pep508_rs::{PackageName, Requirement};
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use pynixify_types::{ProjectMetadata, PypiPackage, PypiSource, satisfies};

use crate::{Error, PypiCache};

type ProjectCell = Arc<OnceCell<Option<Arc<ProjectMetadata>>>>;

/// A client for the PyPI view of the world.
///
/// Project metadata is fetched from the [`PypiCache`] at most once per name: concurrent lookups
/// of the same name wait for the first one instead of hitting the cache again. Failed lookups
/// aren't memoized.
pub struct PypiClient {
    cache: Arc<dyn PypiCache>,
    projects: DashMap<PackageName, ProjectCell>,
    /// Local source trees that replace the registry for a package.
    overrides: DashMap<PackageName, PathBuf>,
}

impl PypiClient {
    pub fn new(cache: impl PypiCache + 'static) -> Self {
        Self::from_arc(Arc::new(cache))
    }

    pub fn from_arc(cache: Arc<dyn PypiCache>) -> Self {
        Self {
            cache,
            projects: DashMap::new(),
            overrides: DashMap::new(),
        }
    }

    /// Use the source tree at `path` for `name` instead of anything published on PyPI.
    pub fn register_local(&self, name: PackageName, path: PathBuf) {
        debug!("Using local source for {name}: {}", path.display());
        self.overrides.insert(name, path);
    }

    /// The local source tree registered for `name`, if any.
    pub fn local_override(&self, name: &PackageName) -> Option<PathBuf> {
        self.overrides.get(name).map(|path| path.value().clone())
    }

    /// The metadata of a project, or `None` if PyPI doesn't know it.
    pub async fn project(
        &self,
        name: &PackageName,
    ) -> Result<Option<Arc<ProjectMetadata>>, Error> {
        let cell = self.projects.entry(name.clone()).or_default().clone();
        if cell.initialized() {
            trace!("Using memoized metadata for {name}");
        }
        let project = cell
            .get_or_try_init(|| async {
                trace!("Fetching metadata for {name}");
                Ok::<_, Error>(self.cache.project(name).await?.map(Arc::new))
            })
            .await?;
        Ok(project.clone())
    }

    /// The highest version of a package that satisfies the requirement.
    ///
    /// A registered local override always wins, whatever the requirement says.
    pub async fn best_version(&self, requirement: &Requirement) -> Result<PypiPackage, Error> {
        let name = &requirement.name;
        if let Some(path) = self.local_override(name) {
            return Ok(PypiPackage::local(name.clone(), path));
        }

        let project = self
            .project(name)
            .await?
            .ok_or_else(|| Error::PackageNotFound(name.clone()))?;

        let (version, file) = project
            .source_releases()
            .filter(|(version, _)| satisfies(requirement, version))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .ok_or_else(|| Error::NoMatchingVersionFound {
                name: name.clone(),
                requirement: requirement.to_string(),
            })?;

        debug!("Selecting {name}=={version} from PyPI");
        Ok(PypiPackage {
            name: name.clone(),
            version,
            source: PypiSource::Registry(file.clone()),
        })
    }

    /// The location of the package source on disk.
    pub async fn source(&self, package: &PypiPackage) -> Result<PathBuf, Error> {
        match &package.source {
            PypiSource::Local(path) => Ok(path.clone()),
            PypiSource::Registry(file) => self.cache.file(file).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;
    use pep440_rs::Version;

    use pynixify_types::File;

    use super::*;
    use crate::{DirectoryCache, MemoryCache};

    const SAMPLEPROJECT: &str = r#"{
        "info": {"name": "sampleproject", "version": "1.3.1"},
        "releases": {
            "1.2.0": [{"filename": "sampleproject-1.2.0.tar.gz", "url": "https://files.pythonhosted.org/packages/sampleproject-1.2.0.tar.gz", "packagetype": "sdist", "digests": {"sha256": "3427a8a5dd0c1e176da48a44efb410875b3973bd9843403a0997e4187c408dc1"}}],
            "1.3.0": [{"filename": "sampleproject-1.3.0.tar.gz", "url": "https://files.pythonhosted.org/packages/sampleproject-1.3.0.tar.gz", "packagetype": "sdist", "digests": {"sha256": "ee67ab9c8b445767203e7d9523d029287f737c2524a00f4b1a8e3ba7e8e9d8b7"}}],
            "1.3.1": [{"filename": "sampleproject-1.3.1.tar.gz", "url": "https://files.pythonhosted.org/packages/sampleproject-1.3.1.tar.gz", "packagetype": "sdist", "digests": {"sha256": "75bb5bb4e74a1b77dc0cff25ebbacb54fe1318aaf99a86a036cefc86ed885ced"}}],
            "2.0.0b1": [{"filename": "sampleproject-2.0.0b1.tar.gz", "url": "https://files.pythonhosted.org/packages/sampleproject-2.0.0b1.tar.gz", "packagetype": "sdist"}]
        }
    }"#;

    fn name(name: &str) -> PackageName {
        PackageName::from_str(name).unwrap()
    }

    fn requirement(requirement: &str) -> Requirement {
        Requirement::from_str(requirement).unwrap()
    }

    fn client() -> PypiClient {
        PypiClient::new(MemoryCache::default().with_project(
            name("sampleproject"),
            serde_json::from_str(SAMPLEPROJECT).unwrap(),
        ))
    }

    #[tokio::test]
    async fn highest_matching_version() -> Result<()> {
        let client = client();

        let package = client.best_version(&requirement("sampleproject")).await?;
        assert_eq!(package.version, Version::from_str("1.3.1")?);

        let package = client
            .best_version(&requirement("sampleproject<1.3.1"))
            .await?;
        assert_eq!(package.version, Version::from_str("1.3.0")?);

        let package = client
            .best_version(&requirement("sampleproject>=2.0.0b1"))
            .await?;
        assert_eq!(package.version, Version::from_str("2.0.0b1")?);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_package() {
        let err = client()
            .best_version(&requirement("flask"))
            .await
            .unwrap_err();
        insta::assert_snapshot!(err, @"Package `flask` was not found on PyPI");
    }

    #[tokio::test]
    async fn no_matching_version() {
        let err = client()
            .best_version(&requirement("sampleproject>3"))
            .await
            .unwrap_err();
        insta::assert_snapshot!(err, @"No version of `sampleproject` on PyPI satisfies `sampleproject>3`");
    }

    #[tokio::test]
    async fn local_override_wins() -> Result<()> {
        let client = client();
        client.register_local(name("SampleProject"), PathBuf::from("/src"));

        let package = client
            .best_version(&requirement("sampleproject>3"))
            .await?;
        assert!(package.is_local());
        assert_eq!(client.source(&package).await?, PathBuf::from("/src"));
        Ok(())
    }

    #[tokio::test]
    async fn registry_source() -> Result<()> {
        let client = PypiClient::new(
            MemoryCache::default()
                .with_project(
                    name("sampleproject"),
                    serde_json::from_str(SAMPLEPROJECT)?,
                )
                .with_file("sampleproject-1.3.1.tar.gz", "/cache/sampleproject-1.3.1.tar.gz"),
        );
        let package = client.best_version(&requirement("sampleproject")).await?;
        assert_eq!(
            client.source(&package).await?,
            PathBuf::from("/cache/sampleproject-1.3.1.tar.gz")
        );

        let older = client
            .best_version(&requirement("sampleproject==1.2.0"))
            .await?;
        assert!(matches!(
            client.source(&older).await,
            Err(Error::FileNotCached { .. })
        ));
        Ok(())
    }

    struct CountingCache {
        inner: MemoryCache,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl PypiCache for CountingCache {
        async fn project(&self, name: &PackageName) -> Result<Option<ProjectMetadata>, Error> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.project(name).await
        }

        async fn file(&self, file: &File) -> Result<PathBuf, Error> {
            self.inner.file(file).await
        }
    }

    #[tokio::test]
    async fn metadata_is_fetched_once() -> Result<()> {
        let cache = Arc::new(CountingCache {
            inner: MemoryCache::default().with_project(
                name("sampleproject"),
                serde_json::from_str(SAMPLEPROJECT)?,
            ),
            fetches: AtomicUsize::new(0),
        });
        let client = PypiClient::from_arc(cache.clone());

        client.best_version(&requirement("sampleproject")).await?;
        client
            .best_version(&requirement("SampleProject<1.3"))
            .await
            .ok();
        client.best_version(&requirement("sampleproject==1.2.0")).await?;
        assert_eq!(cache.fetches.load(Ordering::SeqCst), 1);

        // Unknown projects are memoized too.
        client.project(&name("flask")).await?;
        client.project(&name("flask")).await?;
        assert_eq!(cache.fetches.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn directory_cache() -> Result<()> {
        let root = tempfile::tempdir()?;
        fs_err::write(root.path().join("sampleproject.json"), SAMPLEPROJECT)?;
        fs_err::create_dir_all(root.path().join("files"))?;
        fs_err::write(
            root.path().join("files").join("sampleproject-1.3.1.tar.gz"),
            b"",
        )?;
        fs_err::write(root.path().join("broken.json"), "{")?;

        let client = PypiClient::new(DirectoryCache::new(root.path()));
        let package = client.best_version(&requirement("sampleproject")).await?;
        assert_eq!(package.version, Version::from_str("1.3.1")?);
        assert_eq!(
            client.source(&package).await?,
            root.path().join("files").join("sampleproject-1.3.1.tar.gz")
        );

        assert!(client.project(&name("flask")).await?.is_none());
        assert!(matches!(
            client.project(&name("broken")).await,
            Err(Error::BadJson { .. })
        ));
        Ok(())
    }
}
