//! Rescue-image staging.
//!
//! Builds the directory tree the image generator consumes:
//!
//! ```text
//! isodir/
//!   boot/
//!     <image>.bin
//!     grub/
//!       grub.cfg
//! ```
//!
//! The tree is removed and rebuilt on every packaging run so nothing from a
//! previous run leaks into the image.

use crate::config::BuildConfig;
use crate::error::BuildError;
use std::fs;
use std::path::{Path, PathBuf};

/// Recreate the staging tree from the validated binary and boot-loader config.
///
/// Returns the staging directory.
pub fn stage_iso_tree(config: &BuildConfig) -> Result<PathBuf, BuildError> {
    let staging = &config.outputs.iso_staging;

    if staging.exists() {
        fs::remove_dir_all(staging).map_err(|e| BuildError::filesystem("remove", staging, e))?;
    }

    let boot_dir = staging.join("boot");
    let grub_dir = boot_dir.join("grub");
    fs::create_dir_all(&grub_dir).map_err(|e| BuildError::filesystem("create", &grub_dir, e))?;

    copy_into(&config.sources.grub_config, &grub_dir)?;
    copy_into(&config.outputs.binary, &boot_dir)?;

    log::debug!("[Build] [PACKAGE] Staged {}", staging.display());
    Ok(staging.clone())
}

fn copy_into(source: &Path, dir: &Path) -> Result<(), BuildError> {
    let name = source.file_name().ok_or_else(|| {
        BuildError::filesystem(
            "copy",
            source,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    fs::copy(source, dir.join(name)).map_err(|e| BuildError::filesystem("copy", source, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use tempfile::TempDir;

    fn staged_project() -> (TempDir, BuildConfig) {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("src/grub")).expect("mkdir grub");
        fs::create_dir_all(root.join("out")).expect("mkdir out");
        fs::write(root.join("src/grub/grub.cfg"), "menuentry \"KiwiOS\" {}").expect("write cfg");
        fs::write(root.join("out/kiwios.bin"), b"\x02\xb0\xad\x1b").expect("write bin");
        let options = RunOptions {
            package_iso: true,
            ..Default::default()
        };
        let config = BuildConfig::with_defaults(root, &options).expect("config");
        (dir, config)
    }

    #[test]
    fn test_stage_creates_expected_tree() {
        let (_dir, config) = staged_project();
        let staging = stage_iso_tree(&config).expect("stage");
        assert!(staging.join("boot/grub/grub.cfg").is_file());
        assert!(staging.join("boot/kiwios.bin").is_file());
    }

    #[test]
    fn test_stale_entries_are_removed() {
        let (_dir, config) = staged_project();
        let stale = config.outputs.iso_staging.join("boot/old-kernel.bin");
        fs::create_dir_all(stale.parent().expect("parent")).expect("mkdir");
        fs::write(&stale, "old").expect("write");

        stage_iso_tree(&config).expect("stage");
        assert!(!stale.exists());
    }

    #[test]
    fn test_missing_binary_is_filesystem_error() {
        let (_dir, config) = staged_project();
        fs::remove_file(&config.outputs.binary).expect("remove");
        assert!(matches!(
            stage_iso_tree(&config),
            Err(BuildError::Filesystem { action: "copy", .. })
        ));
    }
}
