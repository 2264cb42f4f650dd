use clap::Parser;
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kiwios_builder::cli::CliArgs;
use kiwios_builder::config::get_available_profiles;
use kiwios_builder::log_collector::{self, get_logs_path, LOG_ENV_VAR};
use kiwios_builder::{BuildError, LaunchOutcome, SystemRunner};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.list_profiles {
        print_profiles();
        return ExitCode::SUCCESS;
    }

    let root = match args.root_dir() {
        Ok(root) => root,
        Err(e) => {
            eprintln!("[Main] ERROR: Cannot determine project root: {}", e);
            return ExitCode::from(2);
        }
    };

    // Logging failures are reported but never stop the build.
    match init_logging(&args, &root) {
        Ok(Some(session)) => log::debug!("[Main] Session log: {}", session.display()),
        Ok(None) => {}
        Err(e) => eprintln!("[Main] WARNING: Logging initialization failed: {:#}", e),
    }

    log::info!("Building KiwiOS");
    let result = kiwios_builder::build(
        &root,
        args.config.as_deref(),
        &args.to_run_options(),
        &SystemRunner,
    );
    log::logger().flush();

    match result {
        Ok(report) => {
            if let Some(iso) = &report.artifacts.iso_image {
                log::info!("ISO image: {}", iso.display());
            }
            if let Some(binary) = &report.artifacts.binary {
                log::info!("Kernel image: {}", binary.display());
            }
            if !matches!(report.launch, LaunchOutcome::NotRequested | LaunchOutcome::Exited) {
                log::warn!("Emulator did not exit cleanly ({:?})", report.launch);
            }
            log::logger().flush();
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_failure(&err);
            log::logger().flush();
            ExitCode::from(exit_byte(err.exit_code()))
        }
    }
}

fn init_logging(args: &CliArgs, root: &Path) -> anyhow::Result<Option<PathBuf>> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let level = log_collector::level_from_flags(args.verbose, args.quiet, env.as_deref());
    let log_dir = if args.no_log_file {
        None
    } else {
        Some(args.log_dir.clone().unwrap_or_else(|| get_logs_path(root)))
    };
    log_collector::init(level, log_dir.as_deref())
}

fn report_failure(err: &BuildError) {
    match err.stage() {
        Some(stage) => log::error!("Build failed at {} ({}): {}", stage, stage.label(), err),
        None => log::error!("Build failed: {}", err),
    }
    let mut source = err.source();
    while let Some(cause) = source {
        log::error!("  caused by: {}", cause);
        source = cause.source();
    }
}

fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

fn print_profiles() {
    println!("Available build profiles:");
    for profile in get_available_profiles() {
        println!(
            "  {:<12} compile {:<18} link {:<18} runtime {:<9} {}",
            profile.name,
            profile.compile_target,
            profile.link_target,
            profile.runtime_support.to_string(),
            profile.description
        );
    }
}
