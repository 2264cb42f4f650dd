use crate::config::{RunOptions, RuntimeSupport};
use clap::Parser;
use std::path::PathBuf;

/// Build the KiwiOS kernel image
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kiwios_builder",
    about = "Build the KiwiOS kernel image",
    version,
    long_about = "Assembles the boot stub, compiles the kernel, links a flat multiboot image \
                  and checks it with grub-file. Optionally packages a bootable ISO and boots \
                  the image in QEMU.\n\n\
                  Examples:\n  \
                  kiwios_builder\n  \
                  kiwios_builder --iso\n  \
                  kiwios_builder --iso --qemu --profile elf"
)]
pub struct CliArgs {
    #[arg(short = 'i', long, help = "Package a bootable ISO after validation")]
    pub iso: bool,

    #[arg(short = 'q', long, help = "Boot the validated image in the emulator")]
    pub qemu: bool,

    #[arg(short = 'p', long, value_name = "NAME", help = "Build profile (see --list-profiles)")]
    pub profile: Option<String>,

    #[arg(
        long,
        value_name = "POLICY",
        help = "Override the profile's runtime support policy: required, optional or disabled"
    )]
    pub runtime_support: Option<RuntimeSupport>,

    #[arg(
        short = 'C',
        long,
        value_name = "DIR",
        help = "Project root (defaults to the current directory)"
    )]
    pub root: Option<PathBuf>,

    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        help = "Settings file (defaults to <root>/kiwibuild.toml when present)"
    )]
    pub config: Option<PathBuf>,

    #[arg(short = 'v', long, help = "Show every command line and debug output")]
    pub verbose: bool,

    #[arg(long, conflicts_with = "verbose", help = "Only report errors")]
    pub quiet: bool,

    #[arg(long, value_name = "DIR", help = "Directory for session logs (defaults to <root>/logs)")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, conflicts_with = "log_dir", help = "Do not write a session log file")]
    pub no_log_file: bool,

    #[arg(long, help = "List the available build profiles and exit")]
    pub list_profiles: bool,
}

impl CliArgs {
    pub fn to_run_options(&self) -> RunOptions {
        RunOptions {
            package_iso: self.iso,
            launch_emulator: self.qemu,
            profile: self.profile.clone(),
            runtime_support: self.runtime_support,
        }
    }

    /// Project root, falling back to the process working directory.
    pub fn root_dir(&self) -> std::io::Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir(),
        }
    }
}
