//! Types shared between the nixpkgs view, the registry client, the resolver and the
//! requirement evaluators.

pub use package::{NixPackage, Package, PypiPackage, PypiSource};
pub use pypi::{Digests, File, PackageType, ProjectInfo, ProjectMetadata};
pub use requirements::{PackageRequirements, RequirementsError, parse_requirements_txt};
pub use specifier::{allows_prereleases, satisfies};
pub use traits::RequirementEvaluator;

mod package;
mod pypi;
mod requirements;
mod specifier;
mod traits;
