use pep440_rs::VersionParseError;
use pep508_rs::{MarkerEnvironment, MarkerEnvironmentBuilder};
use serde::{Deserialize, Serialize};

/// The environment the generated packages are built for.
///
/// Requirements whose markers don't hold in this environment are ignored during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TargetEnvironment {
    /// The Python version, e.g. `3.12` or `3.12.1`.
    pub python_version: String,
    pub implementation_name: String,
    pub platform_python_implementation: String,
    pub os_name: String,
    pub sys_platform: String,
    pub platform_system: String,
    pub platform_machine: String,
}

impl Default for TargetEnvironment {
    fn default() -> Self {
        Self {
            python_version: "3.12".to_string(),
            implementation_name: "cpython".to_string(),
            platform_python_implementation: "CPython".to_string(),
            os_name: "posix".to_string(),
            sys_platform: "linux".to_string(),
            platform_system: "Linux".to_string(),
            platform_machine: "x86_64".to_string(),
        }
    }
}

impl TargetEnvironment {
    /// The default environment, with a different Python version.
    pub fn python(version: impl Into<String>) -> Self {
        Self {
            python_version: version.into(),
            ..Self::default()
        }
    }

    /// Build the PEP 508 marker environment.
    ///
    /// `python_version` is truncated to `major.minor`; `python_full_version` is padded with
    /// zeros to three components.
    pub fn markers(&self) -> Result<MarkerEnvironment, VersionParseError> {
        let components: Vec<&str> = self.python_version.split('.').collect();
        let python_version = components
            .iter()
            .take(2)
            .copied()
            .collect::<Vec<_>>()
            .join(".");
        let python_full_version = if components.len() >= 3 {
            self.python_version.clone()
        } else {
            let mut padded = components.clone();
            padded.resize(3, "0");
            padded.join(".")
        };

        MarkerEnvironment::try_from(MarkerEnvironmentBuilder {
            implementation_name: &self.implementation_name,
            implementation_version: &python_full_version,
            os_name: &self.os_name,
            platform_machine: &self.platform_machine,
            platform_python_implementation: &self.platform_python_implementation,
            platform_release: "",
            platform_system: &self.platform_system,
            platform_version: "",
            python_full_version: &python_full_version,
            python_version: &python_version,
            sys_platform: &self.sys_platform,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pep508_rs::Requirement;

    use super::*;

    fn applies(environment: &TargetEnvironment, requirement: &str) -> bool {
        let markers = environment.markers().unwrap();
        let requirement: Requirement = Requirement::from_str(requirement).unwrap();
        requirement.marker.evaluate(&markers, &[])
    }

    #[test]
    fn python_version() {
        let environment = TargetEnvironment::default();
        assert!(!applies(&environment, "flask; python_version<'3'"));
        assert!(applies(&environment, "flask; python_version>='3.8'"));
        assert!(applies(&environment, "flask; python_full_version=='3.12.0'"));
        assert!(applies(&environment, "flask"));

        let legacy = TargetEnvironment::python("2.7.18");
        assert!(applies(&legacy, "flask; python_version<'3'"));
        assert!(applies(&legacy, "flask; python_full_version=='2.7.18'"));
    }

    #[test]
    fn platform() {
        let environment = TargetEnvironment::default();
        assert!(!applies(&environment, "pywin32; sys_platform=='win32'"));
        assert!(applies(&environment, "uvloop; platform_system=='Linux'"));

        let darwin = TargetEnvironment {
            sys_platform: "darwin".to_string(),
            platform_system: "Darwin".to_string(),
            platform_machine: "arm64".to_string(),
            ..TargetEnvironment::default()
        };
        assert!(applies(&darwin, "appnope; sys_platform=='darwin'"));
        assert!(!applies(&darwin, "uvloop; platform_system=='Linux'"));
    }

    #[test]
    fn invalid_python_version() {
        assert!(TargetEnvironment::python("three").markers().is_err());
    }
}
