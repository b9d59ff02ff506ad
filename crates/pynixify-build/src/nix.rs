use std::ffi::OsStr;
use std::path::PathBuf;

use tokio::process::Command;
use tracing::{debug, instrument};

use crate::Error;

/// Runs `nix-build` and reports the store path it built.
#[derive(Debug, Clone)]
pub struct NixBuild {
    program: PathBuf,
}

impl Default for NixBuild {
    fn default() -> Self {
        Self::new("nix-build")
    }
}

impl NixBuild {
    /// Use a different `nix-build` executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build without creating a `result` symlink and return the output path.
    ///
    /// `nix-build` prints the output path as the last line of stdout.
    #[instrument(skip_all)]
    pub async fn run<I, S>(&self, args: I) -> Result<PathBuf, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .arg("--no-out-link")
            .arg("--no-build-output")
            .args(args);
        debug!("Running {command:?}");

        let output = command
            .output()
            .await
            .map_err(|err| Error::CommandFailed(self.program.display().to_string(), err))?;
        if !output.status.success() {
            return Err(Error::from_command_output(
                format!("`{}` exited with {}", self.program.display(), output.status),
                &output,
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(path) = stdout.lines().map(str::trim).rfind(|line| !line.is_empty()) else {
            return Err(Error::from_command_output(
                format!("`{}` didn't print an output path", self.program.display()),
                &output,
            ));
        };
        debug!("Built {path}");
        Ok(PathBuf::from(path))
    }
}
