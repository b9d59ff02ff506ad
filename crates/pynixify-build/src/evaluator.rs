use std::ffi::OsStr;
use std::future::Future;
use std::path::PathBuf;

use tracing::{debug, instrument};

use pynixify_client::PypiClient;
use pynixify_types::{Package, PackageRequirements, RequirementEvaluator};

use crate::{Error, NixBuild};

/// Evaluates requirements with a Nix expression that inspects the package's `setup.py`.
///
/// PyPI packages are evaluated from the source distribution in the cache (or their local source
/// tree); nixpkgs packages from the `src` attribute of their derivation.
pub struct NixBuildEvaluator<'a> {
    nix_build: NixBuild,
    expression: PathBuf,
    nixpkgs: String,
    client: &'a PypiClient,
}

impl<'a> NixBuildEvaluator<'a> {
    pub fn new(expression: impl Into<PathBuf>, client: &'a PypiClient) -> Self {
        Self {
            nix_build: NixBuild::default(),
            expression: expression.into(),
            nixpkgs: "<nixpkgs>".to_string(),
            client,
        }
    }

    /// Take nixpkgs package sources from another nixpkgs checkout (e.g. a path or a channel).
    #[must_use]
    pub fn with_nixpkgs(mut self, nixpkgs: impl Into<String>) -> Self {
        self.nixpkgs = nixpkgs.into();
        self
    }

    #[must_use]
    pub fn with_nix_build(mut self, nix_build: NixBuild) -> Self {
        self.nix_build = nix_build;
        self
    }

    /// The location of the package source.
    pub async fn source(&self, package: &Package) -> Result<PathBuf, Error> {
        match package {
            Package::Pypi(package) => Ok(self.client.source(package).await?),
            Package::Nixpkgs(package) => {
                let attr = format!("python3Packages.{}.src", package.attr);
                self.nix_build
                    .run([self.nixpkgs.as_str(), "-A", attr.as_str()])
                    .await
            }
        }
    }

    #[instrument(skip_all, fields(package = %package))]
    pub async fn requirements(&self, package: &Package) -> Result<PackageRequirements, Error> {
        let source = std::path::absolute(self.source(package).await?)?;
        debug!("Evaluating the requirements of {package} from {}", source.display());

        let output = self
            .nix_build
            .run([
                self.expression.as_os_str(),
                OsStr::new("--arg"),
                OsStr::new("file"),
                source.as_os_str(),
            ])
            .await?;
        Ok(PackageRequirements::from_result_path(&output)?)
    }
}

impl RequirementEvaluator for NixBuildEvaluator<'_> {
    fn evaluate<'a>(
        &'a self,
        package: &'a Package,
    ) -> impl Future<Output = anyhow::Result<PackageRequirements>> + 'a {
        async move {
            self.requirements(package)
                .await
                .map_err(anyhow::Error::from)
        }
    }
}
