use std::collections::BTreeMap;
use std::str::FromStr;

use pep440_rs::Version;
use serde::{Deserialize, Serialize};
use tracing::trace;
use url::Url;

/// The PyPI JSON API document for a single project.
///
/// See: <https://warehouse.pypa.io/api-reference/json.html#project>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub info: ProjectInfo,
    #[serde(default)]
    pub releases: BTreeMap<String, Vec<File>>,
}

impl ProjectMetadata {
    /// Iterate over every release that can be built from source, i.e., that has at least one
    /// source distribution which was not yanked.
    ///
    /// Release keys that aren't valid PEP 440 versions are skipped.
    pub fn source_releases(&self) -> impl Iterator<Item = (Version, &File)> {
        self.releases.iter().filter_map(|(version, files)| {
            let parsed = match Version::from_str(version) {
                Ok(parsed) => parsed,
                Err(err) => {
                    trace!("Ignoring release `{version}` of {}: {err}", self.info.name);
                    return None;
                }
            };
            let sdist = files
                .iter()
                .find(|file| file.packagetype == PackageType::Sdist && !file.yanked)?;
            Some((parsed, sdist))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    /// The latest version, as reported by the registry.
    #[serde(default)]
    pub version: Option<String>,
}

/// A single distribution file of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub filename: String,
    pub url: Url,
    pub packagetype: PackageType,
    #[serde(default)]
    pub digests: Digests,
    #[serde(default)]
    pub yanked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Sdist,
    BdistWheel,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digests {
    pub sha256: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_releases_skip_wheels_and_yanked() {
        let metadata: ProjectMetadata = serde_json::from_str(
            r#"{
                "info": {"name": "sampleproject", "version": "1.3.1"},
                "releases": {
                    "1.0": [
                        {"filename": "sampleproject-1.0.tar.gz", "url": "https://files.example/sampleproject-1.0.tar.gz", "packagetype": "sdist", "yanked": true}
                    ],
                    "1.2.0": [
                        {"filename": "sampleproject-1.2.0-py3-none-any.whl", "url": "https://files.example/sampleproject-1.2.0-py3-none-any.whl", "packagetype": "bdist_wheel"},
                        {"filename": "sampleproject-1.2.0.tar.gz", "url": "https://files.example/sampleproject-1.2.0.tar.gz", "packagetype": "sdist", "digests": {"sha256": "abc"}}
                    ],
                    "1.3.0": [
                        {"filename": "sampleproject-1.3.0-py3-none-any.whl", "url": "https://files.example/sampleproject-1.3.0-py3-none-any.whl", "packagetype": "bdist_wheel"}
                    ],
                    "not a version": [
                        {"filename": "sampleproject-x.tar.gz", "url": "https://files.example/sampleproject-x.tar.gz", "packagetype": "sdist"}
                    ],
                    "2.0": [
                        {"filename": "sampleproject-2.0.zip", "url": "https://files.example/sampleproject-2.0.zip", "packagetype": "bdist_egg"}
                    ]
                }
            }"#,
        )
        .unwrap();

        let releases: Vec<_> = metadata
            .source_releases()
            .map(|(version, file)| (version.to_string(), file.filename.clone()))
            .collect();
        assert_eq!(
            releases,
            vec![("1.2.0".to_string(), "sampleproject-1.2.0.tar.gz".to_string())]
        );
    }
}
