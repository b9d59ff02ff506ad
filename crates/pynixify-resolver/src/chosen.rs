use pep508_rs::Requirement;
use tracing::trace;

use pynixify_types::{Package, PackageRequirements};

use crate::VersionChooser;

/// The packages that satisfy the declared requirements of a resolved package.
///
/// This is what a build definition lists as dependencies. Build requirements are only used to
/// drive the resolution and aren't part of it.
#[derive(Debug, Clone, Default)]
pub struct ChosenPackageRequirements {
    pub runtime_requirements: Vec<Package>,
    pub test_requirements: Vec<Package>,
}

impl ChosenPackageRequirements {
    /// Map each requirement to the package the chooser picked for it.
    ///
    /// Requirements with markers that don't apply, or that nothing was chosen for (e.g. because
    /// a nixpkgs package declared something unavailable), are left out. Test requirements are
    /// only mapped if `load_tests` is set.
    pub fn from_package_requirements<E>(
        requirements: &PackageRequirements,
        chooser: &VersionChooser<'_, E>,
        load_tests: bool,
    ) -> Self {
        let choose = |requirements: &[Requirement]| {
            let mut packages: Vec<Package> = Vec::with_capacity(requirements.len());
            for requirement in requirements {
                if !chooser.is_active(requirement) {
                    continue;
                }
                let Some(package) = chooser.package(&requirement.name) else {
                    trace!("Nothing was chosen for `{requirement}`");
                    continue;
                };
                if !packages.iter().any(|existing| existing.ptr_eq(package)) {
                    packages.push(package.clone());
                }
            }
            packages
        };

        Self {
            runtime_requirements: choose(&requirements.runtime_requirements),
            test_requirements: if load_tests {
                choose(&requirements.test_requirements)
            } else {
                Vec::new()
            },
        }
    }
}
