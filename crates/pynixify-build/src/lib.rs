//! Evaluate the requirements a Python package declares, by running its `setup.py` inside a Nix
//! build.
//!
//! The Nix expression receives the package source as `file` and writes `setup_requires.txt`,
//! `tests_requires.txt` and `install_requires.txt` to its output.

use std::io;
use std::process::Output;

use thiserror::Error;

use pynixify_types::RequirementsError;

pub use cached::CachedEvaluator;
pub use evaluator::NixBuildEvaluator;
pub use nix::NixBuild;

mod cached;
mod evaluator;
mod nix;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to run `{0}`")]
    CommandFailed(String, #[source] io::Error),

    #[error("{message}:\n--- stdout:\n{stdout}\n--- stderr:\n{stderr}\n---")]
    NixBuild {
        message: String,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to read the requirements written by `nix-build`")]
    Requirements(#[from] RequirementsError),

    #[error(transparent)]
    Client(#[from] pynixify_client::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    fn from_command_output(message: String, output: &Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Self::NixBuild {
            message,
            stdout,
            stderr,
        }
    }
}

/// Write a shell script standing in for `nix-build`.
#[cfg(all(test, unix))]
fn fake_nix_build(dir: &std::path::Path, script: &str) -> NixBuild {
    use std::os::unix::fs::PermissionsExt;

    let program = dir.join("nix-build");
    fs_err::write(&program, format!("#!/bin/sh\n{script}\n")).unwrap();
    fs_err::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
    NixBuild::new(program)
}
