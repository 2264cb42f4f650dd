//! KiwiOS image builder
//!
//! Turns the KiwiOS sources (assembly boot stub, freestanding C++ kernel,
//! linker script, static support files) into a validated multiboot kernel
//! image, optionally packaged as a bootable ISO and optionally booted in QEMU.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy and exit codes
//! - **models**: Stages, tool commands, artifacts and the build report
//! - **config**: Profiles, settings file, validation and resolution
//! - **cli**: Command-line arguments
//! - **log_collector**: Global logger (stderr plus session file)
//! - **orchestrator**: Tool invocation, stage state machine and the pipeline

pub mod cli;
pub mod config;
pub mod error;
pub mod log_collector;
pub mod models;
pub mod orchestrator;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::LogCollector;

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{BuildError, ConfigError};

pub use models::{
    ArtifactSet, BuildReport, LaunchOutcome, OutputMode, Stage, StageKind, StageOutcome,
    StageRecord, ToolCommand, ToolOutput, ToolStatus,
};

pub use config::{BuildConfig, BuildSettings, RunOptions, RuntimeSupport};

pub use orchestrator::{
    BuildOrchestrator, PipelineState, StageState, SystemRunner, ToolRunner, Toolchain,
};

use std::path::Path;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the configuration for `root` and run the whole pipeline.
///
/// `settings_file` overrides the `kiwibuild.toml` lookup in `root`.
pub fn build(
    root: &Path,
    settings_file: Option<&Path>,
    options: &RunOptions,
    runner: &dyn ToolRunner,
) -> Result<BuildReport, BuildError> {
    let settings = config::discover_settings(root, settings_file)?;
    let config = BuildConfig::resolve(root, &settings, options)?;
    BuildOrchestrator::new(config, runner).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, "0.1.0");
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let result = build(
            Path::new("/nonexistent/kiwios/checkout"),
            None,
            &RunOptions::default(),
            &SystemRunner,
        );
        match result {
            Err(err @ BuildError::Config(_)) => assert_eq!(err.exit_code(), 2),
            other => panic!("unexpected result: {:?}", other.map(|r| r.profile)),
        }
    }
}
