use pep440_rs::{Version, VersionSpecifiers};
use pep508_rs::{Requirement, VersionOrUrl};

/// Returns `true` if `version` satisfies the version clauses of `requirement`.
///
/// Pre-releases only match when one of the clauses names a pre-release itself. URL requirements
/// carry no version clauses and match any version.
pub fn satisfies(requirement: &Requirement, version: &Version) -> bool {
    match &requirement.version_or_url {
        None => !version.any_prerelease(),
        Some(VersionOrUrl::VersionSpecifier(specifiers)) => {
            specifiers.contains(version)
                && (!version.any_prerelease() || allows_prereleases(specifiers))
        }
        Some(VersionOrUrl::Url(_)) => true,
    }
}

/// Returns `true` if any of the specifiers names a pre-release or development version.
pub fn allows_prereleases(specifiers: &VersionSpecifiers) -> bool {
    specifiers
        .iter()
        .any(|specifier| specifier.version().any_prerelease())
}
