use std::future::Future;

use crate::{Package, PackageRequirements};

/// Produces the requirements a chosen package declares.
///
/// Implementations usually need to inspect the package source (e.g. by running `setup.py` in a
/// sandbox), which is why evaluation is asynchronous. The resolver treats a failed evaluation as
/// a package without requirements.
pub trait RequirementEvaluator {
    fn evaluate<'a>(
        &'a self,
        package: &'a Package,
    ) -> impl Future<Output = anyhow::Result<PackageRequirements>> + 'a;
}

impl<T: RequirementEvaluator> RequirementEvaluator for &T {
    fn evaluate<'a>(
        &'a self,
        package: &'a Package,
    ) -> impl Future<Output = anyhow::Result<PackageRequirements>> + 'a {
        (**self).evaluate(package)
    }
}
