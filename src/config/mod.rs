//! Build configuration: the immutable record that parameterizes every stage.
//!
//! Resolution order is built-in defaults, then the optional settings file,
//! then command-line options. The result is validated once and read-only for
//! the rest of the run.

pub mod loader;
pub mod profiles;
pub mod validator;

pub use loader::{discover_settings, load_settings_from_file, BuildSettings, SETTINGS_FILE_NAME};
pub use profiles::{get_available_profiles, get_profile, ProfileDefinition, RuntimeSupport, DEFAULT_PROFILE};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Compiler flags for a freestanding 32-bit kernel object: no builtins, no
/// hosted standard library, no exceptions, no RTTI.
pub const KERNEL_COMPILE_FLAGS: &[&str] = &[
    "-ffreestanding",
    "-fno-builtin",
    "-nostdlib",
    "-O2",
    "-Wall",
    "-Wextra",
    "-fno-exceptions",
    "-fno-rtti",
];

/// Flags handed to the linker driver ahead of the input objects.
pub const KERNEL_LINK_FLAGS: &[&str] = &["-ffreestanding", "-O2", "-nostdlib"];

/// Options that come from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub package_iso: bool,
    pub launch_emulator: bool,
    pub profile: Option<String>,
    pub runtime_support: Option<RuntimeSupport>,
}

/// External programs invoked by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub assembler: String,
    pub compiler: String,
    pub validator: String,
    pub image_generator: String,
    pub emulator: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            assembler: "nasm".to_string(),
            compiler: "clang".to_string(),
            validator: "grub-file".to_string(),
            image_generator: "grub-mkrescue".to_string(),
            emulator: "qemu-system-i386".to_string(),
        }
    }
}

/// Absolute paths of the build inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub boot_source: PathBuf,
    pub kernel_source: PathBuf,
    pub linker_script: PathBuf,
    /// Every file in here is copied verbatim into the output directory.
    pub static_dir: PathBuf,
    /// Boot-loader configuration placed at `boot/grub/` in the ISO tree.
    pub grub_config: PathBuf,
}

/// Absolute paths of the artifacts the pipeline produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub out_dir: PathBuf,
    pub boot_object: PathBuf,
    pub kernel_object: PathBuf,
    pub binary: PathBuf,
    pub iso_staging: PathBuf,
    pub iso_image: PathBuf,
    pub report: PathBuf,
}

impl OutputLayout {
    pub fn new(out_dir: PathBuf, image_name: &str) -> Self {
        OutputLayout {
            boot_object: out_dir.join("boot.o"),
            kernel_object: out_dir.join("kernel.o"),
            binary: out_dir.join(format!("{}.bin", image_name)),
            iso_staging: out_dir.join("isodir"),
            iso_image: out_dir.join(format!("{}.iso", image_name)),
            report: out_dir.join("build-report.json"),
            out_dir,
        }
    }
}

/// The resolved configuration for one build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub root: PathBuf,
    pub profile: ProfileDefinition,
    /// Effective policy; starts from the profile and may be overridden.
    pub runtime_support: RuntimeSupport,
    pub image_name: String,
    pub tools: ToolPaths,
    pub sources: SourceLayout,
    pub outputs: OutputLayout,
    pub assembler_format: String,
    pub compile_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub linker_flavor: String,
    pub emulator_args: Vec<String>,
    pub package_iso: bool,
    pub launch_emulator: bool,
}

impl BuildConfig {
    /// Resolve defaults, settings and command-line options into a validated config.
    pub fn resolve(
        root: &Path,
        settings: &BuildSettings,
        options: &RunOptions,
    ) -> Result<Self, ConfigError> {
        validator::validate_root(root)?;
        let root = root.canonicalize().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(format!("Project root not found: {}", root.display()))
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let profile_name = options
            .profile
            .as_deref()
            .or(settings.profile.as_deref())
            .unwrap_or(DEFAULT_PROFILE);
        let profile = get_profile(profile_name)
            .ok_or_else(|| ConfigError::UnknownProfile(profile_name.to_string()))?;

        let runtime_support = options
            .runtime_support
            .or(settings.runtime_support)
            .unwrap_or(profile.runtime_support);

        let image_name = settings
            .image_name
            .clone()
            .unwrap_or_else(|| "kiwios".to_string());

        let defaults = ToolPaths::default();
        let tools = ToolPaths {
            assembler: settings.tools.assembler.clone().unwrap_or(defaults.assembler),
            compiler: settings.tools.compiler.clone().unwrap_or(defaults.compiler),
            validator: settings.tools.validator.clone().unwrap_or(defaults.validator),
            image_generator: settings
                .tools
                .image_generator
                .clone()
                .unwrap_or(defaults.image_generator),
            emulator: settings.tools.emulator.clone().unwrap_or(defaults.emulator),
        };

        let paths = &settings.paths;
        let at_root = |custom: &Option<PathBuf>, default: &str| -> PathBuf {
            match custom {
                Some(path) if path.is_absolute() => path.clone(),
                Some(path) => root.join(path),
                None => root.join(default),
            }
        };

        let sources = SourceLayout {
            boot_source: at_root(&paths.boot_source, "src/boot.asm"),
            kernel_source: at_root(&paths.kernel_source, "src/kernel.cpp"),
            linker_script: at_root(&paths.linker_script, "linker.ld"),
            static_dir: at_root(&paths.static_dir, "src/copy"),
            grub_config: at_root(&paths.grub_config, "src/grub/grub.cfg"),
        };
        let outputs = OutputLayout::new(at_root(&paths.out_dir, "out"), &image_name);

        let emulator_args = settings
            .tools
            .emulator_args
            .clone()
            .unwrap_or_else(|| vec!["-kernel".to_string()]);

        let config = BuildConfig {
            root,
            profile,
            runtime_support,
            image_name,
            tools,
            sources,
            outputs,
            assembler_format: "elf32".to_string(),
            compile_flags: KERNEL_COMPILE_FLAGS.iter().map(|s| s.to_string()).collect(),
            link_flags: KERNEL_LINK_FLAGS.iter().map(|s| s.to_string()).collect(),
            linker_flavor: "-fuse-ld=lld".to_string(),
            emulator_args,
            package_iso: options.package_iso,
            launch_emulator: options.launch_emulator,
        };

        validator::validate_config(&config)?;
        Ok(config)
    }

    /// Defaults only, for the given root.
    pub fn with_defaults(root: &Path, options: &RunOptions) -> Result<Self, ConfigError> {
        Self::resolve(root, &BuildSettings::default(), options)
    }
}
