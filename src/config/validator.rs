//! Config validation.

use crate::config::BuildConfig;
use crate::error::ConfigError;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

lazy_static! {
    static ref TARGET_TRIPLE: Regex =
        Regex::new(r"^[a-z0-9_]+(-[a-z0-9_.]+){1,3}$").expect("valid target triple regex");
    static ref IMAGE_NAME: Regex =
        Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid image name regex");
}

/// Validate a target triple such as `i686-elf` or `i686-pc-none-elf`.
pub fn validate_target_triple(triple: &str) -> Result<(), ConfigError> {
    if !TARGET_TRIPLE.is_match(triple) {
        return Err(ConfigError::ValidationFailed(format!(
            "Invalid target triple: '{}'",
            triple
        )));
    }
    Ok(())
}

/// Validate the image base name (used for `<name>.bin` and `<name>.iso`).
pub fn validate_image_name(name: &str) -> Result<(), ConfigError> {
    if !IMAGE_NAME.is_match(name) {
        return Err(ConfigError::ValidationFailed(format!(
            "Image name must be alphanumeric with '-' or '_', got: '{}'",
            name
        )));
    }
    Ok(())
}

/// Validate an external tool name (program name or path).
pub fn validate_tool(role: &str, program: &str) -> Result<(), ConfigError> {
    if program.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(format!(
            "{} program cannot be empty",
            role
        )));
    }
    Ok(())
}

/// Paths are passed to tools as UTF-8 arguments, so the root must be valid UTF-8.
pub fn validate_root(root: &Path) -> Result<(), ConfigError> {
    if root.to_str().is_none() {
        return Err(ConfigError::ValidationFailed(format!(
            "Project root contains invalid characters: {}",
            root.display()
        )));
    }
    Ok(())
}

/// Resolve `.` and `..` segments without touching the filesystem.
fn lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// The shallow clean removes every file directly inside the output directory,
/// so it may not be the project root, one of its parents, or hold any input.
pub fn validate_output_dir(config: &BuildConfig) -> Result<(), ConfigError> {
    let out_dir = lexical(&config.outputs.out_dir);

    if lexical(&config.root).starts_with(&out_dir) {
        return Err(ConfigError::ValidationFailed(format!(
            "Output directory {} would contain the project root {}",
            out_dir.display(),
            config.root.display()
        )));
    }

    let inputs = [
        ("boot source", &config.sources.boot_source),
        ("kernel source", &config.sources.kernel_source),
        ("linker script", &config.sources.linker_script),
        ("static directory", &config.sources.static_dir),
        ("boot-loader config", &config.sources.grub_config),
    ];
    for (what, path) in inputs {
        if lexical(path).starts_with(&out_dir) {
            return Err(ConfigError::ValidationFailed(format!(
                "Output directory {} would contain the {} {}",
                out_dir.display(),
                what,
                path.display()
            )));
        }
    }
    Ok(())
}

/// Validate a fully resolved build configuration.
pub fn validate_config(config: &BuildConfig) -> Result<(), ConfigError> {
    validate_root(&config.root)?;
    validate_target_triple(&config.profile.compile_target)?;
    validate_target_triple(&config.profile.link_target)?;
    validate_image_name(&config.image_name)?;

    validate_tool("Assembler", &config.tools.assembler)?;
    validate_tool("Compiler", &config.tools.compiler)?;
    validate_tool("Validator", &config.tools.validator)?;
    validate_tool("Image generator", &config.tools.image_generator)?;
    validate_tool("Emulator", &config.tools.emulator)?;

    for path in [&config.outputs.out_dir, &config.sources.static_dir] {
        if path.to_str().is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "Path contains invalid characters: {}",
                path.display()
            )));
        }
    }

    if config.sources.grub_config.file_name().is_none() {
        return Err(ConfigError::ValidationFailed(
            "Boot-loader config path has no file name".to_string(),
        ));
    }

    validate_output_dir(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_triples() {
        assert!(validate_target_triple("i686-elf").is_ok());
        assert!(validate_target_triple("i686-pc-none-elf").is_ok());
        assert!(validate_target_triple("x86_64-unknown-linux-gnu").is_ok());
    }

    #[test]
    fn test_invalid_triples() {
        assert!(validate_target_triple("").is_err());
        assert!(validate_target_triple("i686").is_err());
        assert!(validate_target_triple("i686 elf").is_err());
        assert!(validate_target_triple("I686-ELF").is_err());
    }

    #[test]
    fn test_image_names() {
        assert!(validate_image_name("kiwios").is_ok());
        assert!(validate_image_name("kiwi-os_2").is_ok());
        assert!(validate_image_name("../kiwios").is_err());
        assert!(validate_image_name("").is_err());
    }

    #[test]
    fn test_lexical_resolves_dot_segments() {
        assert_eq!(lexical(Path::new("/kiwi/./out")), PathBuf::from("/kiwi/out"));
        assert_eq!(lexical(Path::new("/kiwi/out/..")), PathBuf::from("/kiwi"));
        assert_eq!(lexical(Path::new("/kiwi/src/../build")), PathBuf::from("/kiwi/build"));
    }

    #[test]
    fn test_empty_tool_rejected() {
        assert!(validate_tool("Compiler", "clang").is_ok());
        assert!(validate_tool("Compiler", "  ").is_err());
    }
}
