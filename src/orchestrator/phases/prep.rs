//! Preparation: input preflight and output workspace setup.
//!
//! Runs before any external tool. Preflight confirms the inputs exist so a
//! missing file is reported as such rather than as an assembler or compiler
//! failure. Workspace preparation then applies the shallow clean policy and
//! copies the static resources into the output directory.

use crate::config::BuildConfig;
use crate::error::BuildError;
use std::fs;
use std::path::{Path, PathBuf};

/// What the shallow clean did to the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
    /// Regular files and symlinks that were deleted.
    pub removed: Vec<PathBuf>,
    /// Subdirectories left in place.
    pub skipped: Vec<PathBuf>,
}

/// Verify that every input the run needs is present.
pub fn preflight(config: &BuildConfig) -> Result<(), BuildError> {
    let sources = &config.sources;
    require_file("boot source", &sources.boot_source)?;
    require_file("kernel source", &sources.kernel_source)?;
    require_file("linker script", &sources.linker_script)?;

    if !sources.static_dir.is_dir() {
        return Err(BuildError::MissingInput {
            what: "static resources directory",
            path: sources.static_dir.clone(),
        });
    }

    if config.package_iso {
        require_file("boot-loader config", &sources.grub_config)?;
    }

    log::debug!("[Build] [PREFLIGHT] All inputs present under {}", config.root.display());
    Ok(())
}

fn require_file(what: &'static str, path: &Path) -> Result<(), BuildError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BuildError::MissingInput {
            what,
            path: path.to_path_buf(),
        })
    }
}

/// Shallow clean: remove the regular files directly inside `dir`.
///
/// Symlinks are removed as links. Subdirectories and their contents are never
/// touched. A missing `dir` is created.
pub fn shallow_clean(dir: &Path) -> Result<CleanSummary, BuildError> {
    fs::create_dir_all(dir).map_err(|e| BuildError::filesystem("create", dir, e))?;

    let mut summary = CleanSummary::default();
    for entry in fs::read_dir(dir).map_err(|e| BuildError::filesystem("read", dir, e))? {
        let entry = entry.map_err(|e| BuildError::filesystem("read", dir, e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| BuildError::filesystem("inspect", &path, e))?;

        if file_type.is_dir() {
            summary.skipped.push(path);
            continue;
        }

        fs::remove_file(&path).map_err(|e| BuildError::filesystem("remove", &path, e))?;
        summary.removed.push(path);
    }

    summary.removed.sort();
    summary.skipped.sort();
    Ok(summary)
}

/// Copy every file in `static_dir` into `out_dir`, in name order.
///
/// The static directory is flat; a subdirectory in it is an error.
pub fn copy_static_files(static_dir: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut sources = Vec::new();
    for entry in fs::read_dir(static_dir).map_err(|e| BuildError::filesystem("read", static_dir, e))? {
        let entry = entry.map_err(|e| BuildError::filesystem("read", static_dir, e))?;
        sources.push(entry.path());
    }
    sources.sort();

    let mut copied = Vec::with_capacity(sources.len());
    for source in sources {
        if source.is_dir() {
            return Err(BuildError::filesystem(
                "copy",
                &source,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "static resources must be plain files",
                ),
            ));
        }
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = out_dir.join(name);
        fs::copy(&source, &target).map_err(|e| BuildError::filesystem("copy", &source, e))?;
        log::debug!("[Build] [PREP] Copied {} -> {}", source.display(), target.display());
        copied.push(target);
    }
    Ok(copied)
}

/// Clean the output directory and seed it with the static resources.
///
/// Returns the paths of the copied files. Running it twice in a row leaves
/// the directory in the same state.
pub fn prepare_workspace(config: &BuildConfig) -> Result<Vec<PathBuf>, BuildError> {
    let out_dir = &config.outputs.out_dir;
    let summary = shallow_clean(out_dir)?;
    log::info!(
        "[Build] [PREP] Cleaned {} ({} files removed, {} directories kept)",
        out_dir.display(),
        summary.removed.len(),
        summary.skipped.len()
    );

    let copied = copy_static_files(&config.sources.static_dir, out_dir)?;
    log::info!("[Build] [PREP] Copied {} static files", copied.len());
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use tempfile::TempDir;

    fn project() -> (TempDir, BuildConfig) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = dir.path();
        fs::create_dir_all(root.join("src/copy")).expect("mkdir copy");
        fs::write(root.join("src/boot.asm"), "; boot").expect("write boot");
        fs::write(root.join("src/kernel.cpp"), "// kernel").expect("write kernel");
        fs::write(root.join("linker.ld"), "ENTRY(_start)").expect("write ld");
        let config = BuildConfig::with_defaults(root, &RunOptions::default()).expect("config");
        (dir, config)
    }

    #[test]
    fn test_preflight_passes_with_all_inputs() {
        let (_dir, config) = project();
        assert!(preflight(&config).is_ok());
    }

    #[test]
    fn test_preflight_reports_missing_boot_source() {
        let (_dir, config) = project();
        fs::remove_file(&config.sources.boot_source).expect("remove");
        match preflight(&config) {
            Err(BuildError::MissingInput { what, path }) => {
                assert_eq!(what, "boot source");
                assert_eq!(path, config.sources.boot_source);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_preflight_requires_grub_config_only_for_iso() {
        let (_dir, mut config) = project();
        assert!(preflight(&config).is_ok());
        config.package_iso = true;
        assert!(matches!(
            preflight(&config),
            Err(BuildError::MissingInput { what: "boot-loader config", .. })
        ));
    }

    #[test]
    fn test_shallow_clean_creates_missing_dir() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("out");
        let summary = shallow_clean(&out).expect("clean");
        assert!(out.is_dir());
        assert!(summary.removed.is_empty());
    }

    #[test]
    fn test_shallow_clean_leaves_directories() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path();
        fs::write(out.join("kernel.o"), "obj").expect("write");
        fs::create_dir_all(out.join("isodir/boot")).expect("mkdir");
        fs::write(out.join("isodir/boot/kiwios.bin"), "bin").expect("write");

        let summary = shallow_clean(out).expect("clean");
        assert_eq!(summary.removed, vec![out.join("kernel.o")]);
        assert_eq!(summary.skipped, vec![out.join("isodir")]);
        assert!(out.join("isodir/boot/kiwios.bin").exists());
    }

    #[test]
    fn test_static_subdirectory_is_rejected() {
        let (_dir, config) = project();
        fs::create_dir_all(config.sources.static_dir.join("nested")).expect("mkdir");
        assert!(matches!(
            prepare_workspace(&config),
            Err(BuildError::Filesystem { action: "copy", .. })
        ));
    }

    #[test]
    fn test_prepare_workspace_copies_in_order() {
        let (_dir, config) = project();
        fs::write(config.sources.static_dir.join("b.txt"), "b").expect("write");
        fs::write(config.sources.static_dir.join("a.txt"), "a").expect("write");

        let copied = prepare_workspace(&config).expect("prepare");
        let out = &config.outputs.out_dir;
        assert_eq!(copied, vec![out.join("a.txt"), out.join("b.txt")]);
        assert_eq!(fs::read_to_string(out.join("a.txt")).expect("read"), "a");
    }
}
