//! Compiler runtime-support discovery.
//!
//! The compiler reports its runtime directory as a line of text. It is parsed
//! into a typed optional path here, then combined with the build's runtime
//! support policy to decide what the link stage receives.

use crate::config::RuntimeSupport;
use crate::error::BuildError;
use std::path::{Component, Path, PathBuf};

/// Parse the output of `--print-runtime-dir`.
///
/// Blank output means the toolchain has no runtime directory and yields `None`.
/// Anything else must be a single absolute path.
pub fn parse_runtime_dir(stdout: &str) -> Result<Option<PathBuf>, BuildError> {
    let mut lines = stdout.lines().map(str::trim).filter(|line| !line.is_empty());

    let Some(first) = lines.next() else {
        return Ok(None);
    };
    if lines.next().is_some() {
        return Err(BuildError::RuntimeSupport(format!(
            "compiler reported more than one runtime directory: {:?}",
            stdout
        )));
    }

    let path = Path::new(first);
    if !path.is_absolute() {
        return Err(BuildError::RuntimeSupport(format!(
            "compiler reported a relative runtime directory: {}",
            first
        )));
    }

    // Rebuilding from components drops trailing separators and `.` segments.
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    Ok(Some(normalized))
}

/// Decide which runtime archive, if any, is handed to the linker.
pub fn resolve_runtime_library(
    policy: RuntimeSupport,
    runtime_dir: Option<&Path>,
    library_name: &str,
) -> Result<Option<PathBuf>, BuildError> {
    match policy {
        RuntimeSupport::Disabled => Ok(None),
        RuntimeSupport::Optional => Ok(runtime_dir.map(|dir| dir.join(library_name))),
        RuntimeSupport::Required => {
            let dir = runtime_dir.ok_or_else(|| {
                BuildError::RuntimeSupport(format!(
                    "{} is required but the compiler reported no runtime directory",
                    library_name
                ))
            })?;
            let library = dir.join(library_name);
            if !library.is_file() {
                return Err(BuildError::RuntimeSupport(format!(
                    "{} is required but was not found at {}",
                    library_name,
                    library.display()
                )));
            }
            Ok(Some(library))
        }
    }
}
