use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use pep508_rs::{MarkerEnvironment, PackageName};
use rustc_hash::FxHashSet;

/// Which packages get their test requirements resolved.
///
/// Only consulted for packages taken from PyPI: the tests of nixpkgs packages already ran when
/// nixpkgs built them.
#[derive(Clone, Default)]
pub enum LoadTests {
    /// Never resolve test requirements.
    #[default]
    None,
    /// Resolve test requirements of every PyPI package.
    All,
    /// Resolve test requirements of the named packages only.
    Packages(FxHashSet<PackageName>),
    /// Ask a predicate.
    Custom(Arc<dyn Fn(&PackageName) -> bool + Send + Sync>),
}

impl LoadTests {
    pub fn custom(predicate: impl Fn(&PackageName) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    pub fn should_load(&self, name: &PackageName) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Packages(packages) => packages.contains(name),
            Self::Custom(predicate) => predicate(name),
        }
    }
}

impl Debug for LoadTests {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::All => f.write_str("All"),
            Self::Packages(packages) => f.debug_tuple("Packages").field(packages).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Settings that stay fixed for a whole resolution.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// The environment requirement markers are evaluated against.
    pub markers: MarkerEnvironment,
    pub load_tests: LoadTests,
    /// Upper bound for a single requirement evaluation or registry lookup.
    pub timeout: Option<Duration>,
}

impl ResolverOptions {
    pub fn new(markers: MarkerEnvironment) -> Self {
        Self {
            markers,
            load_tests: LoadTests::default(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_load_tests(mut self, load_tests: LoadTests) -> Self {
        self.load_tests = load_tests;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
