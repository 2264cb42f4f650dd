//! Command lines for each pipeline stage.
//!
//! Pure functions of the build configuration: nothing here touches the
//! filesystem or spawns processes. Source and output paths are absolute; the
//! link, validate, package and launch stages run inside the output directory.

use crate::config::BuildConfig;
use crate::models::{Stage, StageKind, ToolCommand};
use std::path::Path;

/// `nasm -felf32 <boot.asm> -o <out>/boot.o`
pub fn assemble(config: &BuildConfig) -> Stage {
    let command = ToolCommand::new(&config.tools.assembler, &config.root)
        .arg(format!("-f{}", config.assembler_format))
        .path_arg(&config.sources.boot_source)
        .arg("-o")
        .path_arg(&config.outputs.boot_object);
    Stage::new(StageKind::Assemble, command)
}

/// `clang -target <triple> -c <kernel.cpp> -o <out>/kernel.o <freestanding flags>`
pub fn compile(config: &BuildConfig) -> Stage {
    let command = ToolCommand::new(&config.tools.compiler, &config.root)
        .arg("-target")
        .arg(&config.profile.compile_target)
        .arg("-c")
        .path_arg(&config.sources.kernel_source)
        .arg("-o")
        .path_arg(&config.outputs.kernel_object)
        .args(config.compile_flags.iter().cloned());
    Stage::new(StageKind::Compile, command)
}

/// `clang --print-runtime-dir`, run with captured output.
pub fn discover_runtime(config: &BuildConfig) -> Stage {
    let command = ToolCommand::new(&config.tools.compiler, &config.root).arg("--print-runtime-dir");
    Stage::new(StageKind::Discover, command)
}

/// Linker driver invocation producing the flat kernel image.
///
/// `runtime_library` is appended as a single static-archive argument after the
/// objects when present, and contributes nothing otherwise.
pub fn link(config: &BuildConfig, runtime_library: Option<&Path>) -> Stage {
    let mut command = ToolCommand::new(&config.tools.compiler, &config.outputs.out_dir)
        .arg(format!("--target={}", config.profile.link_target))
        .arg(format!("-march={}", config.profile.march))
        .arg("-T")
        .path_arg(&config.sources.linker_script)
        .arg("-o")
        .path_arg(&config.outputs.binary)
        .args(config.link_flags.iter().cloned())
        .path_arg(&config.outputs.boot_object)
        .path_arg(&config.outputs.kernel_object);

    if let Some(library) = runtime_library {
        command = command.path_arg(library);
    }

    let command = command.arg(&config.linker_flavor).arg("-static");
    Stage::new(StageKind::Link, command)
}

/// `grub-file --is-x86-multiboot <image>`
pub fn validate(config: &BuildConfig) -> Stage {
    let command = ToolCommand::new(&config.tools.validator, &config.outputs.out_dir)
        .arg("--is-x86-multiboot")
        .path_arg(&config.outputs.binary);
    Stage::new(StageKind::Validate, command)
}

/// `grub-mkrescue -o <image>.iso <staging dir>`
pub fn package(config: &BuildConfig) -> Stage {
    let command = ToolCommand::new(&config.tools.image_generator, &config.outputs.out_dir)
        .arg("-o")
        .path_arg(&config.outputs.iso_image)
        .path_arg(&config.outputs.iso_staging);
    Stage::new(StageKind::Package, command)
}

/// `qemu-system-i386 -kernel <image>`
pub fn launch(config: &BuildConfig) -> Stage {
    let command = ToolCommand::new(&config.tools.emulator, &config.outputs.out_dir)
        .args(config.emulator_args.iter().cloned())
        .path_arg(&config.outputs.binary);
    Stage::new(StageKind::Launch, command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use tempfile::TempDir;

    fn config() -> (TempDir, BuildConfig) {
        let dir = TempDir::new().expect("tempdir");
        let config =
            BuildConfig::with_defaults(dir.path(), &RunOptions::default()).expect("config");
        (dir, config)
    }

    fn s(path: &Path) -> String {
        path.display().to_string()
    }

    #[test]
    fn test_assemble_command() {
        let (_dir, config) = config();
        let stage = assemble(&config);
        assert_eq!(stage.command.program, "nasm");
        assert_eq!(
            stage.command.args,
            vec![
                "-felf32".to_string(),
                s(&config.sources.boot_source),
                "-o".to_string(),
                s(&config.outputs.boot_object),
            ]
        );
        assert_eq!(stage.command.cwd, config.root);
    }

    #[test]
    fn test_compile_is_freestanding() {
        let (_dir, config) = config();
        let args = compile(&config).command.args;
        assert_eq!(&args[..2], &["-target".to_string(), "i686-elf".to_string()]);
        for flag in [
            "-ffreestanding",
            "-fno-builtin",
            "-nostdlib",
            "-fno-exceptions",
            "-fno-rtti",
            "-O2",
            "-Wall",
            "-Wextra",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {}", flag);
        }
    }

    #[test]
    fn test_link_without_runtime_library() {
        let (_dir, config) = config();
        let stage = link(&config, None);
        let args = &stage.command.args;
        assert_eq!(args[0], "--target=i686-pc-none-elf");
        assert_eq!(args[1], "-march=i686");
        assert_eq!(args[2], "-T");
        assert_eq!(args[3], s(&config.sources.linker_script));
        assert_eq!(args.last().map(String::as_str), Some("-static"));
        assert!(args.iter().all(|a| !a.is_empty()));
        assert!(!args.iter().any(|a| a.ends_with(".a")));
        assert_eq!(stage.command.cwd, config.outputs.out_dir);
    }

    #[test]
    fn test_link_with_runtime_library_adds_one_argument() {
        let (_dir, config) = config();
        let library = Path::new("/opt/clang/lib/linux/libclang_rt.builtins-i386.a");
        let without = link(&config, None).command.args;
        let with = link(&config, Some(library)).command.args;
        assert_eq!(with.len(), without.len() + 1);
        assert_eq!(with.iter().filter(|a| a.as_str() == s(library)).count(), 1);
    }

    #[test]
    fn test_launch_uses_flat_image() {
        let (_dir, config) = config();
        let stage = launch(&config);
        assert_eq!(stage.command.program, "qemu-system-i386");
        assert_eq!(
            stage.command.args,
            vec!["-kernel".to_string(), s(&config.outputs.binary)]
        );
    }

    #[test]
    fn test_package_targets_staging_tree() {
        let (_dir, config) = config();
        let args = package(&config).command.args;
        assert_eq!(
            args,
            vec![
                "-o".to_string(),
                s(&config.outputs.iso_image),
                s(&config.outputs.iso_staging),
            ]
        );
    }
}
