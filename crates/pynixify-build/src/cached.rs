use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use pep440_rs::Version;
use tokio::sync::OnceCell;
use tracing::trace;

use pynixify_types::{Package, PackageRequirements, PypiSource, RequirementEvaluator};

/// Remembers the requirements of every package it evaluated.
///
/// Resolving and reporting both need the requirements of each package, and evaluating them
/// usually means a `nix-build`. Failed evaluations aren't remembered.
pub struct CachedEvaluator<E> {
    inner: E,
    evaluated: DashMap<EvaluationKey, Arc<OnceCell<PackageRequirements>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EvaluationKey {
    nixpkgs: bool,
    attr: String,
    version: Version,
    local: Option<PathBuf>,
}

impl From<&Package> for EvaluationKey {
    fn from(package: &Package) -> Self {
        let local = package.as_pypi().and_then(|package| match &package.source {
            PypiSource::Local(path) => Some(path.clone()),
            PypiSource::Registry(_) => None,
        });
        Self {
            nixpkgs: package.is_nixpkgs(),
            attr: package.attr().to_string(),
            version: package.version().clone(),
            local,
        }
    }
}

impl<E> CachedEvaluator<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            evaluated: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: RequirementEvaluator> RequirementEvaluator for CachedEvaluator<E> {
    fn evaluate<'a>(
        &'a self,
        package: &'a Package,
    ) -> impl Future<Output = anyhow::Result<PackageRequirements>> + 'a {
        async move {
            let cell = self
                .evaluated
                .entry(EvaluationKey::from(package))
                .or_default()
                .clone();
            if cell.initialized() {
                trace!("Using memoized requirements of {package}");
            }
            let requirements = cell
                .get_or_try_init(|| self.inner.evaluate(package))
                .await?;
            Ok::<_, anyhow::Error>(requirements.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pep508_rs::{PackageName, Requirement};

    use pynixify_types::PypiPackage;

    use super::*;

    #[derive(Default)]
    struct CountingEvaluator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl RequirementEvaluator for CountingEvaluator {
        fn evaluate<'a>(
            &'a self,
            _package: &'a Package,
        ) -> impl Future<Output = anyhow::Result<PackageRequirements>> + 'a {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let result: anyhow::Result<PackageRequirements> = if self.fail {
                    Err(anyhow::anyhow!("nix-build failed"))
                } else {
                    Ok(PackageRequirements {
                        runtime_requirements: vec![Requirement::from_str("flask").unwrap()],
                        ..PackageRequirements::default()
                    })
                };
                result
            }
        }
    }

    fn local(name: &str, path: &str) -> Package {
        Package::from(PypiPackage::local(
            PackageName::from_str(name).unwrap(),
            PathBuf::from(path),
        ))
    }

    #[tokio::test]
    async fn evaluates_once() {
        let evaluator = CachedEvaluator::new(CountingEvaluator::default());
        let package = local("myproject", "/src");

        for _ in 0..3 {
            let requirements = evaluator.evaluate(&package).await.unwrap();
            assert_eq!(requirements.runtime_requirements.len(), 1);
        }
        assert_eq!(evaluator.inner().calls.load(Ordering::SeqCst), 1);

        // Another source for the same name is another evaluation.
        evaluator
            .evaluate(&local("myproject", "/elsewhere"))
            .await
            .unwrap();
        assert_eq!(evaluator.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_memoized() {
        let evaluator = CachedEvaluator::new(CountingEvaluator {
            fail: true,
            ..CountingEvaluator::default()
        });
        let package = local("myproject", "/src");

        assert!(evaluator.evaluate(&package).await.is_err());
        assert!(evaluator.evaluate(&package).await.is_err());
        assert_eq!(evaluator.inner().calls.load(Ordering::SeqCst), 2);
    }
}
