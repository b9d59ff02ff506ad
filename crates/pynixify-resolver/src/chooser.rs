use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use pep508_rs::{MarkerEnvironment, PackageName, Requirement};
use rustc_hash::{FxBuildHasher, FxHashSet};
use tracing::{debug, instrument, trace, warn};

use pynixify_client::PypiClient;
use pynixify_nixpkgs::NixpkgsData;
use pynixify_types::{
    Package, PackageRequirements, PypiPackage, PypiSource, RequirementEvaluator, satisfies,
};

use crate::{ResolveError, ResolverOptions};

/// Picks one package per canonical name, following requirements transitively.
///
/// nixpkgs is always preferred: PyPI is only consulted for names nixpkgs doesn't know at all.
/// The first requirement for a name picks its version, and every later requirement for the same
/// name must be satisfied by that choice.
///
/// Requirements are followed with an explicit worklist, depth first. A name is chosen before
/// its own requirements are visited, so cycles in the requirement graph end at the first
/// repeated name.
pub struct VersionChooser<'a, E> {
    nixpkgs: &'a NixpkgsData,
    pypi: &'a PypiClient,
    evaluator: E,
    options: ResolverOptions,
    state: ResolutionState,
}

#[derive(Debug, Default)]
struct ResolutionState {
    /// The chosen package for each canonical name, in the order they were chosen.
    chosen: IndexMap<PackageName, Package, FxBuildHasher>,
    /// The names whose requirements are still being visited.
    expanding: FxHashSet<PackageName>,
}

#[derive(Debug)]
enum Work {
    /// Choose a package for the requirement, unless one was chosen already.
    Require {
        requirement: Requirement,
        /// The package that declared the requirement, or `None` for the caller's requirements.
        parent: Option<Package>,
    },
    /// Every requirement of the package has been visited.
    Finish(PackageName),
}

impl<'a, E: RequirementEvaluator> VersionChooser<'a, E> {
    pub fn new(
        nixpkgs: &'a NixpkgsData,
        pypi: &'a PypiClient,
        evaluator: E,
        options: ResolverOptions,
    ) -> Self {
        Self {
            nixpkgs,
            pypi,
            evaluator,
            options,
            state: ResolutionState::default(),
        }
    }

    /// Choose a package for the requirement and everything it (transitively) requires.
    ///
    /// Requiring something that was already chosen only checks that the choice satisfies the
    /// requirement. Requirements whose markers don't apply to the target environment are
    /// ignored.
    #[instrument(skip_all, fields(requirement = %requirement))]
    pub async fn require(&mut self, requirement: &Requirement) -> Result<(), ResolveError> {
        self.run(vec![Work::Require {
            requirement: requirement.clone(),
            parent: None,
        }])
        .await
    }

    /// Use the source tree at `path` as the package `name`, and follow its requirements.
    ///
    /// This is how the project being packaged enters the resolution. Its version is unknown,
    /// so it satisfies every later requirement for the same name.
    #[instrument(skip_all, fields(name = name, path = %path.display()))]
    pub async fn require_local(&mut self, name: &str, path: &Path) -> Result<(), ResolveError> {
        let name = PackageName::from_str(name)?;
        let path = path.to_path_buf();

        if let Some(existing) = self.state.chosen.get(&name) {
            let same_source = existing
                .as_pypi()
                .is_some_and(|package| package.source == PypiSource::Local(path.clone()));
            if same_source {
                return Ok(());
            }
            return Err(ResolveError::LocalOverride {
                name,
                chosen: existing.to_string(),
            });
        }

        self.pypi.register_local(name.clone(), path.clone());
        let package = Package::from(PypiPackage::local(name, path));
        let mut stack = Vec::new();
        self.expand(package, &mut stack).await?;
        self.run(stack).await
    }

    async fn run(&mut self, mut stack: Vec<Work>) -> Result<(), ResolveError> {
        while let Some(work) = stack.pop() {
            match work {
                Work::Finish(name) => {
                    trace!("Finished the requirements of {name}");
                    self.state.expanding.remove(&name);
                }
                Work::Require {
                    requirement,
                    parent,
                } => {
                    let Err(err) = self.visit(&requirement, &mut stack).await else {
                        continue;
                    };
                    match parent {
                        // nixpkgs already builds the parent, so a requirement that can't be
                        // chosen is of no consequence.
                        Some(parent) if parent.is_nixpkgs() && err.is_lookup_failure() => {
                            debug!("Ignoring `{requirement}` required by {parent}: {err}");
                        }
                        _ => {
                            self.state.expanding.clear();
                            return Err(err);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn visit(
        &mut self,
        requirement: &Requirement,
        stack: &mut Vec<Work>,
    ) -> Result<(), ResolveError> {
        match self.select(requirement).await? {
            Some(package) => self.expand(package, stack).await,
            None => Ok(()),
        }
    }

    /// Pick a package for the requirement, or `None` if there's nothing new to choose.
    async fn select(&self, requirement: &Requirement) -> Result<Option<Package>, ResolveError> {
        if !self.is_active(requirement) {
            trace!("Ignoring `{requirement}`: markers don't apply");
            return Ok(None);
        }

        let name = &requirement.name;
        if let Some(chosen) = self.state.chosen.get(name) {
            if chosen.is_local() || satisfies(requirement, chosen.version()) {
                trace!("{chosen} already satisfies `{requirement}`");
                return Ok(None);
            }
            return Err(ResolveError::NoMatchingVersionFound {
                name: name.clone(),
                requirement: requirement.to_string(),
                chosen: Some(chosen.version().clone()),
            });
        }

        if self.nixpkgs.contains(name) && self.pypi.local_override(name).is_none() {
            let best = self
                .nixpkgs
                .variants_for_requirement(requirement)?
                .into_iter()
                .next()
                .ok_or_else(|| ResolveError::NoMatchingVersionFound {
                    name: name.clone(),
                    requirement: requirement.to_string(),
                    chosen: None,
                })?;
            return Ok(Some(Package::Nixpkgs(best)));
        }

        let package = self
            .with_timeout(
                || format!("looking up `{name}` on PyPI"),
                self.pypi.best_version(requirement),
            )
            .await??;
        Ok(Some(Package::from(package)))
    }

    /// Record the choice and queue the requirements of the package.
    async fn expand(&mut self, package: Package, stack: &mut Vec<Work>) -> Result<(), ResolveError> {
        let requirements = self.requirements(&package).await?;

        let name = package.name().clone();
        debug!("Choosing {package}");
        self.state.chosen.insert(name.clone(), package.clone());
        self.state.expanding.insert(name.clone());

        // Test requirements of nixpkgs packages were satisfied when nixpkgs ran the tests.
        let load_tests = !package.is_nixpkgs() && self.options.load_tests.should_load(&name);

        stack.push(Work::Finish(name));
        let PackageRequirements {
            build_requirements,
            test_requirements,
            runtime_requirements,
        } = requirements;
        let tests = if load_tests {
            test_requirements
        } else {
            Vec::new()
        };
        // Pushed in reverse, so that build requirements are visited first.
        for requirement in tests
            .into_iter()
            .rev()
            .chain(runtime_requirements.into_iter().rev())
            .chain(build_requirements.into_iter().rev())
        {
            stack.push(Work::Require {
                requirement,
                parent: Some(package.clone()),
            });
        }
        Ok(())
    }

    /// The declared requirements of a package.
    ///
    /// If the evaluator fails, the package is assumed to have no requirements. Only running out
    /// of time is an error.
    pub async fn requirements(&self, package: &Package) -> Result<PackageRequirements, ResolveError> {
        let evaluation = self
            .with_timeout(
                || format!("evaluating the requirements of {package}"),
                self.evaluator.evaluate(package),
            )
            .await?;
        match evaluation {
            Ok(requirements) => Ok(requirements),
            Err(err) => {
                warn!("Failed to evaluate the requirements of {package}, assuming there are none: {err:#}");
                Ok(PackageRequirements::default())
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        action: impl FnOnce() -> String,
        future: impl Future<Output = T>,
    ) -> Result<T, ResolveError> {
        let Some(timeout) = self.options.timeout else {
            return Ok(future.await);
        };
        tokio::time::timeout(timeout, future)
            .await
            .map_err(|_| ResolveError::Timeout {
                action: action(),
                timeout,
            })
    }
}

impl<E> VersionChooser<'_, E> {
    /// The chosen package for a raw (not necessarily canonical) name.
    pub fn package_for(&self, name: &str) -> Option<&Package> {
        let name = PackageName::from_str(name).ok()?;
        self.package(&name)
    }

    /// The chosen package for a canonical name.
    pub fn package(&self, name: &PackageName) -> Option<&Package> {
        self.state.chosen.get(name)
    }

    /// Every package chosen from PyPI (or a local source tree), in the order they were chosen.
    pub fn all_pypi_packages(&self) -> Vec<&Package> {
        self.state
            .chosen
            .values()
            .filter(|package| !package.is_nixpkgs())
            .collect()
    }

    /// Every chosen package, in the order they were chosen.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.state.chosen.values()
    }

    pub fn is_expanding(&self, name: &PackageName) -> bool {
        self.state.expanding.contains(name)
    }

    /// Returns `true` if the markers of the requirement hold in the target environment.
    pub fn is_active(&self, requirement: &Requirement) -> bool {
        requirement.marker.evaluate(&self.options.markers, &[])
    }

    pub fn markers(&self) -> &MarkerEnvironment {
        &self.options.markers
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// The source tree or archive of a chosen PyPI package.
    pub async fn source(&self, package: &PypiPackage) -> Result<PathBuf, ResolveError> {
        Ok(self.pypi.source(package).await?)
    }
}
