use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use pep440_rs::Version;
use pep508_rs::PackageName;

use crate::File;

/// A package that was chosen (or is a candidate) for a canonical name.
///
/// Cloning is cheap: both variants are reference counted, and two clones of the same chosen
/// package compare equal under [`Package::ptr_eq`].
#[derive(Debug, Clone)]
pub enum Package {
    /// A pre-built package from nixpkgs.
    Nixpkgs(Arc<NixPackage>),
    /// A package fetched from PyPI, or a local source tree standing in for one.
    Pypi(Arc<PypiPackage>),
}

impl Package {
    /// The canonical name of the package.
    pub fn name(&self) -> &PackageName {
        match self {
            Self::Nixpkgs(package) => &package.name,
            Self::Pypi(package) => &package.name,
        }
    }

    /// The version of the package.
    pub fn version(&self) -> &Version {
        match self {
            Self::Nixpkgs(package) => &package.version,
            Self::Pypi(package) => &package.version,
        }
    }

    /// The identity used when evaluating requirements and emitting build definitions.
    ///
    /// For nixpkgs packages this is the attribute inside `python3Packages`; PyPI packages are
    /// identified by their canonical name.
    pub fn attr(&self) -> &str {
        match self {
            Self::Nixpkgs(package) => &package.attr,
            Self::Pypi(package) => package.name.as_ref(),
        }
    }

    pub fn as_nixpkgs(&self) -> Option<&Arc<NixPackage>> {
        match self {
            Self::Nixpkgs(package) => Some(package),
            Self::Pypi(_) => None,
        }
    }

    pub fn as_pypi(&self) -> Option<&Arc<PypiPackage>> {
        match self {
            Self::Nixpkgs(_) => None,
            Self::Pypi(package) => Some(package),
        }
    }

    pub fn is_nixpkgs(&self) -> bool {
        matches!(self, Self::Nixpkgs(_))
    }

    /// Returns `true` if this package is a local source tree override.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Pypi(package) if package.is_local())
    }

    /// Returns `true` if both values refer to the same package instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nixpkgs(left), Self::Nixpkgs(right)) => Arc::ptr_eq(left, right),
            (Self::Pypi(left), Self::Pypi(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl From<NixPackage> for Package {
    fn from(package: NixPackage) -> Self {
        Self::Nixpkgs(Arc::new(package))
    }
}

impl From<PypiPackage> for Package {
    fn from(package: PypiPackage) -> Self {
        Self::Pypi(Arc::new(package))
    }
}

impl Display for Package {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nixpkgs(package) => write!(f, "{} (nixpkgs: {})", package, package.attr),
            Self::Pypi(package) => Display::fmt(package, f),
        }
    }
}

/// A pre-built Python package available in nixpkgs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NixPackage {
    /// The attribute under `python3Packages`, e.g. `pytestrunner`.
    pub attr: String,
    /// The canonical name the package is indexed under.
    pub name: PackageName,
    /// The name of the package on PyPI, as spelled by nixpkgs.
    pub pypi_name: String,
    pub version: Version,
    /// The fixed fetch location of the package source, e.g. a `mirror://pypi/...` URL.
    pub src: Option<String>,
}

impl Display for NixPackage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// A package taken from PyPI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PypiPackage {
    pub name: PackageName,
    pub version: Version,
    pub source: PypiSource,
}

impl PypiPackage {
    /// A local source tree standing in for the package, e.g. the project being packaged.
    ///
    /// The real version is unknown until the source is built, so a development placeholder is
    /// used instead.
    pub fn local(name: PackageName, path: PathBuf) -> Self {
        Self {
            name,
            version: Version::new([0, 1]).with_dev(Some(0)),
            source: PypiSource::Local(path),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, PypiSource::Local(_))
    }
}

impl Display for PypiPackage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            PypiSource::Local(path) => write!(f, "{} @ {}", self.name, path.display()),
            PypiSource::Registry(_) => write!(f, "{}=={}", self.name, self.version),
        }
    }
}

/// Where the source of a [`PypiPackage`] comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PypiSource {
    /// A source tree on the local filesystem.
    Local(PathBuf),
    /// A source distribution published on the registry.
    Registry(File),
}
