use std::path::{Path, PathBuf};
use std::str::FromStr;

use pep508_rs::{Pep508Error, Requirement};
use thiserror::Error;

/// The requirements a package declares, split by the phase they are needed in.
#[derive(Debug, Clone, Default)]
pub struct PackageRequirements {
    /// `setup_requires`: needed to build the package.
    pub build_requirements: Vec<Requirement>,
    /// `tests_require`: needed to run the package's test suite.
    pub test_requirements: Vec<Requirement>,
    /// `install_requires`: needed at runtime.
    pub runtime_requirements: Vec<Requirement>,
}

impl PackageRequirements {
    /// Read the requirement files written by the `setup.py` inspection expression.
    ///
    /// The directory contains `setup_requires.txt`, `tests_requires.txt` and
    /// `install_requires.txt`, one requirement per line.
    pub fn from_result_path(path: &Path) -> Result<Self, RequirementsError> {
        let read = |filename: &str| -> Result<Vec<Requirement>, RequirementsError> {
            let file = path.join(filename);
            let content = fs_err::read_to_string(&file)?;
            parse_requirements_txt(&content).map_err(|err| err.with_file(file))
        };
        Ok(Self {
            build_requirements: read("setup_requires.txt")?,
            test_requirements: read("tests_requires.txt")?,
            runtime_requirements: read("install_requires.txt")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.build_requirements.is_empty()
            && self.test_requirements.is_empty()
            && self.runtime_requirements.is_empty()
    }
}

/// Parse a plain list of requirements, one per line.
///
/// Blank lines and `#` comments are ignored, and a trailing `\` joins a line with the next one.
pub fn parse_requirements_txt(content: &str) -> Result<Vec<Requirement>, RequirementsError> {
    let parse = |entry: &str| {
        Requirement::from_str(entry).map_err(|err| RequirementsError::Parse {
            line: entry.to_string(),
            file: None,
            err: Box::new(err),
        })
    };

    let mut requirements = Vec::new();
    let mut pending = String::new();
    for line in content.lines() {
        let line = match line.find(" #").or_else(|| line.starts_with('#').then_some(0)) {
            Some(comment) => &line[..comment],
            None => line,
        };
        if let Some(continued) = line.strip_suffix('\\') {
            pending.push_str(continued);
            continue;
        }
        pending.push_str(line);
        let entry = pending.trim();
        if !entry.is_empty() {
            requirements.push(parse(entry)?);
        }
        pending.clear();
    }
    let entry = pending.trim();
    if !entry.is_empty() {
        requirements.push(parse(entry)?);
    }
    Ok(requirements)
}

#[derive(Debug, Error)]
pub enum RequirementsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Couldn't parse requirement `{line}`{}", .file.as_ref().map(|file| format!(" in `{}`", file.display())).unwrap_or_default())]
    Parse {
        line: String,
        file: Option<PathBuf>,
        #[source]
        err: Box<Pep508Error>,
    },
}

impl RequirementsError {
    fn with_file(self, path: PathBuf) -> Self {
        match self {
            Self::Parse { line, err, .. } => Self::Parse {
                line,
                file: Some(path),
                err,
            },
            err @ Self::Io(_) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_continuations() {
        let requirements = parse_requirements_txt(
            "# generated\n\nflask>=1.0 # web\nrequests \\\n  [socks]>=2\n\npytz\n",
        )
        .unwrap();
        let names: Vec<_> = requirements.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["flask>=1.0", "requests[socks]>=2", "pytz"]);
    }

    #[test]
    fn markers_are_kept() {
        let requirements = parse_requirements_txt("enum34; python_version<'3.4'").unwrap();
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].name.as_ref(), "enum34");
    }

    #[test]
    fn invalid_requirement() {
        let err = parse_requirements_txt("flask\n>=1.0\n").unwrap_err();
        assert!(matches!(err, RequirementsError::Parse { ref line, .. } if line == ">=1.0"));
    }

    #[test]
    fn from_result_path() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("setup_requires.txt"), "setuptools_scm\n").unwrap();
        fs_err::write(dir.path().join("tests_requires.txt"), "pytest\nmock\n").unwrap();
        fs_err::write(dir.path().join("install_requires.txt"), "").unwrap();

        let requirements = PackageRequirements::from_result_path(dir.path()).unwrap();
        assert_eq!(requirements.build_requirements.len(), 1);
        assert_eq!(requirements.test_requirements.len(), 2);
        assert!(requirements.runtime_requirements.is_empty());
    }

    #[test]
    fn from_result_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PackageRequirements::from_result_path(dir.path()).unwrap_err();
        assert!(matches!(err, RequirementsError::Io(_)));
    }
}
