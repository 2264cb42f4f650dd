//! Build orchestration: the fixed, linear KiwiOS pipeline
//! (Assemble -> Compile -> Discover -> Link -> Validate -> Package? -> Launch?).

pub mod commands;
pub mod executor;
pub mod phases;
pub mod runtime;
pub mod state;

pub use executor::{SystemRunner, ToolRunner, Toolchain};
pub use state::{PipelineState, StageState};

use crate::config::{BuildConfig, RuntimeSupport};
use crate::error::BuildError;
use crate::log_stage;
use crate::models::{
    ArtifactSet, BuildReport, LaunchOutcome, OutputMode, StageKind, ToolStatus,
};
use chrono::Local;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Drives one build run from a resolved configuration.
///
/// A run either returns a complete, validated `BuildReport` or the error of
/// the first stage that failed. Nothing is retried.
pub struct BuildOrchestrator<'a> {
    config: BuildConfig,
    toolchain: Toolchain<'a>,
    state: PipelineState,
    artifacts: ArtifactSet,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(config: BuildConfig, runner: &'a dyn ToolRunner) -> Self {
        BuildOrchestrator {
            config,
            toolchain: Toolchain::new(runner),
            state: PipelineState::new(),
            artifacts: ArtifactSet::default(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Stage states so far; useful after `run` has returned an error.
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Execute every stage in order.
    pub fn run(&mut self) -> Result<BuildReport, BuildError> {
        let started_at = Local::now();
        log::info!(
            "[Build] Building {} (profile {}, runtime support {})",
            self.config.image_name,
            self.config.profile.name,
            self.config.runtime_support
        );

        phases::preflight(&self.config)?;
        log_stage!("Copying files...");
        self.artifacts.copied = phases::prepare_workspace(&self.config)?;

        self.assemble()?;
        self.compile()?;
        let runtime_library = self.discover_runtime()?;
        self.link(runtime_library)?;
        self.validate()?;

        if self.config.package_iso {
            self.package()?;
        } else {
            self.state.skip(StageKind::Package)?;
            log::debug!("[Build] Packaging not requested");
        }

        let launch = if self.config.launch_emulator {
            self.launch()?
        } else {
            self.state.skip(StageKind::Launch)?;
            LaunchOutcome::NotRequested
        };

        let report = BuildReport {
            profile: self.config.profile.name.clone(),
            started_at,
            finished_at: Local::now(),
            stages: self.state.records(),
            artifacts: self.artifacts.clone(),
            launch,
        };
        write_report(&self.config.outputs.report, &report)?;
        log::info!(
            "[Build] Finished in {} ms; report at {}",
            (report.finished_at - report.started_at).num_milliseconds(),
            self.config.outputs.report.display()
        );
        Ok(report)
    }

    /// Run one stage body under the state machine.
    ///
    /// The body returns its value plus the exit status to record. On error the
    /// stage is marked failed with whatever status the error carries.
    fn execute<T>(
        &mut self,
        kind: StageKind,
        body: impl FnOnce(&Self) -> Result<(T, Option<ToolStatus>), BuildError>,
    ) -> Result<T, BuildError> {
        self.state.begin(kind)?;
        log_stage!("{}...", kind.label());

        match body(&*self) {
            Ok((value, status)) => {
                self.state.succeed(kind, status)?;
                Ok(value)
            }
            Err(err) => {
                let err = err.in_stage(kind);
                let status = match &err {
                    BuildError::ToolInvocation { status, .. } | BuildError::Validation { status, .. } => {
                        Some(*status)
                    }
                    _ => None,
                };
                self.state.fail(kind, status)?;
                log::error!("[Build] {} failed: {}", kind, err);
                Err(err)
            }
        }
    }

    fn assemble(&mut self) -> Result<(), BuildError> {
        self.execute(StageKind::Assemble, |this| {
            let output = this.toolchain.invoke(&commands::assemble(&this.config))?;
            Ok(((), Some(output.status)))
        })?;
        self.artifacts.boot_object = Some(self.config.outputs.boot_object.clone());
        Ok(())
    }

    fn compile(&mut self) -> Result<(), BuildError> {
        self.execute(StageKind::Compile, |this| {
            let output = this.toolchain.invoke(&commands::compile(&this.config))?;
            Ok(((), Some(output.status)))
        })?;
        self.artifacts.kernel_object = Some(self.config.outputs.kernel_object.clone());
        Ok(())
    }

    /// Query the compiler and decide which runtime archive the link receives.
    fn discover_runtime(&mut self) -> Result<Option<PathBuf>, BuildError> {
        self.execute(StageKind::Discover, |this| {
            let output = this.toolchain.capture(&commands::discover_runtime(&this.config))?;
            let runtime_dir = match runtime::parse_runtime_dir(&output.stdout) {
                Ok(dir) => dir,
                // Nothing is linked from the answer under the disabled policy.
                Err(err) if this.config.runtime_support == RuntimeSupport::Disabled => {
                    log::warn!("[Build] {}", err);
                    None
                }
                Err(err) => return Err(err),
            };

            match &runtime_dir {
                Some(dir) => log::info!("{}", dir.display()),
                None => log::info!("[Build] Compiler reported no runtime directory"),
            }

            let library = runtime::resolve_runtime_library(
                this.config.runtime_support,
                runtime_dir.as_deref(),
                &this.config.profile.runtime_library,
            )?;
            match &library {
                Some(path) => log::debug!("[Build] Linking runtime support {}", path.display()),
                None => log::debug!(
                    "[Build] No runtime support library linked (policy {})",
                    this.config.runtime_support
                ),
            }
            Ok((library, Some(output.status)))
        })
    }

    fn link(&mut self, runtime_library: Option<PathBuf>) -> Result<(), BuildError> {
        self.execute(StageKind::Link, |this| {
            let stage = commands::link(&this.config, runtime_library.as_deref());
            let output = this.toolchain.invoke(&stage)?;
            Ok(((), Some(output.status)))
        })?;
        self.artifacts.binary = Some(self.config.outputs.binary.clone());
        Ok(())
    }

    /// The multiboot gate. A nonzero verdict is a validation failure, not a tool failure.
    fn validate(&mut self) -> Result<(), BuildError> {
        self.execute(StageKind::Validate, |this| {
            let output = this
                .toolchain
                .probe(&commands::validate(&this.config), OutputMode::Forward)?;
            if !output.status.success() {
                return Err(BuildError::Validation {
                    binary: this.config.outputs.binary.clone(),
                    status: output.status,
                });
            }
            Ok(((), Some(output.status)))
        })?;
        log::info!("Success!");
        Ok(())
    }

    fn package(&mut self) -> Result<(), BuildError> {
        log_stage!("Generating isodir & grub stuff...");
        let staging = self.execute(StageKind::Package, |this| {
            let staging = phases::stage_iso_tree(&this.config)?;
            let output = this.toolchain.invoke(&commands::package(&this.config))?;
            Ok((staging, Some(output.status)))
        })?;
        self.artifacts.iso_staging = Some(staging);
        self.artifacts.iso_image = Some(self.config.outputs.iso_image.clone());
        Ok(())
    }

    /// Launch the emulator. Failures are reported and recorded, never propagated.
    fn launch(&mut self) -> Result<LaunchOutcome, BuildError> {
        let stage = commands::launch(&self.config);
        self.state.begin(stage.kind)?;
        log_stage!("{}...", stage.label());

        match self.toolchain.probe(&stage, OutputMode::Forward) {
            Ok(output) if output.status.success() => {
                self.state.succeed(StageKind::Launch, Some(output.status))?;
                Ok(LaunchOutcome::Exited)
            }
            Ok(output) => {
                log::error!(
                    "[Build] Emulator `{}` exited with {}; the built artifacts are unaffected",
                    stage.command.program,
                    output.status
                );
                self.state.fail(StageKind::Launch, Some(output.status))?;
                Ok(LaunchOutcome::Failed(output.status))
            }
            Err(err) => {
                log::error!("[Build] {}; the built artifacts are unaffected", err);
                self.state.fail(StageKind::Launch, None)?;
                Ok(LaunchOutcome::NotStarted)
            }
        }
    }
}

fn write_report(path: &Path, report: &BuildReport) -> Result<(), BuildError> {
    let file = File::create(path).map_err(|e| BuildError::filesystem("create", path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .map_err(|e| BuildError::filesystem("write", path, e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use crate::models::{ToolCommand, ToolOutput};
    use std::cell::RefCell;
    use std::fs;
    use std::io;
    use tempfile::TempDir;

    /// Succeeds every command, answering the runtime query with `runtime_dir`.
    struct QuietRunner {
        runtime_dir: String,
        calls: RefCell<Vec<String>>,
    }

    impl ToolRunner for QuietRunner {
        fn run(&self, command: &ToolCommand, _mode: OutputMode) -> io::Result<ToolOutput> {
            self.calls.borrow_mut().push(command.program.clone());
            let mut output = ToolOutput::with_status(ToolStatus::Exited(0));
            if command.args.iter().any(|a| a == "--print-runtime-dir") {
                output.stdout = self.runtime_dir.clone();
            }
            Ok(output)
        }
    }

    fn project(options: RunOptions) -> (TempDir, BuildConfig) {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("src/copy")).expect("mkdir");
        fs::create_dir_all(root.join("src/grub")).expect("mkdir");
        fs::write(root.join("src/boot.asm"), "").expect("write");
        fs::write(root.join("src/kernel.cpp"), "").expect("write");
        fs::write(root.join("src/grub/grub.cfg"), "").expect("write");
        fs::write(root.join("linker.ld"), "").expect("write");
        let config = BuildConfig::with_defaults(root, &options).expect("config");
        (dir, config)
    }

    #[test]
    fn test_default_run_skips_optional_stages() {
        let (_dir, config) = project(RunOptions::default());
        let runner = QuietRunner {
            runtime_dir: "/usr/lib/clang/17/lib/linux\n".to_string(),
            calls: RefCell::new(Vec::new()),
        };
        let mut orchestrator = BuildOrchestrator::new(config, &runner);
        let report = orchestrator.run().expect("build succeeds");

        assert_eq!(report.executed_stages(), StageKind::ALL[..5].to_vec());
        assert_eq!(report.launch, LaunchOutcome::NotRequested);
        assert_eq!(orchestrator.state().state_of(StageKind::Package), StageState::Skipped);
        assert!(orchestrator.config().outputs.report.is_file());
        assert_eq!(runner.calls.borrow().len(), 5);
    }

    #[test]
    fn test_required_runtime_without_directory_fails_discovery() {
        let options = RunOptions {
            profile: Some("elf".to_string()),
            ..Default::default()
        };
        let (_dir, config) = project(options);
        let runner = QuietRunner {
            runtime_dir: String::new(),
            calls: RefCell::new(Vec::new()),
        };
        let mut orchestrator = BuildOrchestrator::new(config, &runner);
        let err = orchestrator.run().expect_err("required runtime is missing");

        assert_eq!(err.stage(), Some(StageKind::Discover));
        assert_eq!(orchestrator.state().state_of(StageKind::Discover), StageState::Failed);
        assert_eq!(orchestrator.state().state_of(StageKind::Link), StageState::Pending);
        assert!(orchestrator.artifacts().binary.is_none());
    }

    #[test]
    fn test_unusable_runtime_answer_is_ignored_when_disabled() {
        let (_dir, config) = project(RunOptions::default());
        let runner = QuietRunner {
            runtime_dir: "lib/clang\n".to_string(),
            calls: RefCell::new(Vec::new()),
        };
        let report = BuildOrchestrator::new(config, &runner)
            .run()
            .expect("disabled policy never uses the answer");
        assert!(report.executed_stages().contains(&StageKind::Link));
    }

    #[test]
    fn test_unusable_runtime_answer_fails_optional_policy() {
        let options = RunOptions {
            runtime_support: Some(RuntimeSupport::Optional),
            ..Default::default()
        };
        let (_dir, config) = project(options);
        let runner = QuietRunner {
            runtime_dir: "lib/clang\n".to_string(),
            calls: RefCell::new(Vec::new()),
        };
        let mut orchestrator = BuildOrchestrator::new(config, &runner);
        let err = orchestrator.run().expect_err("relative runtime directory");
        assert!(matches!(err, BuildError::RuntimeSupport(_)));
        assert_eq!(orchestrator.state().state_of(StageKind::Link), StageState::Pending);
    }
}
