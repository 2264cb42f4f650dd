//! Settings file loader.
//!
//! The optional `kiwibuild.toml` at the project root overrides the built-in
//! defaults. Every key is optional; unknown keys are rejected so typos surface
//! instead of being silently ignored.

use crate::config::profiles::RuntimeSupport;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file looked up at the project root when `--config` is not given.
pub const SETTINGS_FILE_NAME: &str = "kiwibuild.toml";

/// Overrides read from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    pub profile: Option<String>,
    pub image_name: Option<String>,
    pub runtime_support: Option<RuntimeSupport>,
    pub tools: ToolSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    pub assembler: Option<String>,
    pub compiler: Option<String>,
    pub validator: Option<String>,
    pub image_generator: Option<String>,
    pub emulator: Option<String>,
    pub emulator_args: Option<Vec<String>>,
}

/// Paths are relative to the project root unless absolute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    pub out_dir: Option<PathBuf>,
    pub boot_source: Option<PathBuf>,
    pub kernel_source: Option<PathBuf>,
    pub linker_script: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub grub_config: Option<PathBuf>,
}

/// Load settings from a TOML file.
pub fn load_settings_from_file(path: &Path) -> Result<BuildSettings, ConfigError> {
    validate_settings_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!(
                "Settings file not found at: {}",
                path.display()
            ))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let settings: BuildSettings = toml::from_str(&content)?;
    log::debug!("Loaded build settings from {}", path.display());
    Ok(settings)
}

/// Resolve the settings for a run.
///
/// An explicitly requested file must exist. Without one, `<root>/kiwibuild.toml`
/// is used when present and built-in defaults otherwise.
pub fn discover_settings(root: &Path, explicit: Option<&Path>) -> Result<BuildSettings, ConfigError> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        return load_settings_from_file(&path);
    }

    let default_path = root.join(SETTINGS_FILE_NAME);
    if default_path.is_file() {
        load_settings_from_file(&default_path)
    } else {
        Ok(BuildSettings::default())
    }
}

/// Settings are TOML; any other file is refused before it is read.
pub fn validate_settings_path(path: &Path) -> Result<(), ConfigError> {
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));
    if !is_toml {
        return Err(ConfigError::ValidationFailed(format!(
            "Settings file {} is not a .toml file",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_settings_path() {
        assert!(validate_settings_path(Path::new("kiwibuild.toml")).is_ok());
        assert!(validate_settings_path(Path::new("kiwibuild.json")).is_err());
        assert!(validate_settings_path(Path::new("kiwibuild")).is_err());
        assert!(validate_settings_path(Path::new("")).is_err());
        assert!(validate_settings_path(Path::new("conf/KIWIBUILD.TOML")).is_ok());
    }

    #[test]
    fn test_parse_partial_settings() {
        let settings: BuildSettings = toml::from_str(
            r#"
            profile = "elf"
            [tools]
            compiler = "clang-17"
            "#,
        )
        .expect("valid settings");
        assert_eq!(settings.profile.as_deref(), Some("elf"));
        assert_eq!(settings.tools.compiler.as_deref(), Some("clang-17"));
        assert!(settings.tools.assembler.is_none());
        assert!(settings.paths.out_dir.is_none());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result: Result<BuildSettings, _> = toml::from_str("optimisation = \"O3\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_runtime_support_key() {
        let settings: BuildSettings =
            toml::from_str("runtime_support = \"optional\"").expect("valid settings");
        assert_eq!(settings.runtime_support, Some(RuntimeSupport::Optional));
    }

    #[test]
    fn test_discover_without_file_yields_defaults() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let settings = discover_settings(dir.path(), None).expect("defaults");
        assert_eq!(settings, BuildSettings::default());
    }

    #[test]
    fn test_discover_explicit_missing_file_fails() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let result = discover_settings(dir.path(), Some(Path::new("custom.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
