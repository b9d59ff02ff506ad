//! Choose one version per Python package, preferring what nixpkgs already builds.
//!
//! Resolution is greedy: the first requirement for a package picks its version, and later
//! requirements can only confirm that choice or fail. There is no backtracking.

pub use chooser::VersionChooser;
pub use chosen::ChosenPackageRequirements;
pub use error::ResolveError;
pub use markers::TargetEnvironment;
pub use options::{LoadTests, ResolverOptions};
pub use resolution::{Dependency, Resolution, ResolvedPackage, ResolvedSource};

mod chooser;
mod chosen;
mod error;
mod markers;
mod options;
mod resolution;
