//! Toolchain invocation: runs external programs for the pipeline stages.
//!
//! `ToolRunner` is the seam between the pipeline and the operating system.
//! `SystemRunner` spawns real processes; tests substitute a recording stub.
//! `Toolchain` wraps a runner with the pipeline's failure policy: a nonzero
//! exit is a hard stage failure, never retried.

use crate::error::BuildError;
use crate::models::{OutputMode, Stage, StageKind, ToolCommand, ToolOutput, ToolStatus};
use std::io;
use std::process::Command;

/// Runs one external command to completion.
pub trait ToolRunner {
    /// Block until the command exits. `Err` means the process could not be started.
    fn run(&self, command: &ToolCommand, mode: OutputMode) -> io::Result<ToolOutput>;
}

/// Production runner backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ToolCommand, mode: OutputMode) -> io::Result<ToolOutput> {
        let mut process = Command::new(&command.program);
        process.args(&command.args).current_dir(&command.cwd);

        match mode {
            OutputMode::Forward => {
                let status = process.status()?;
                Ok(ToolOutput::with_status(ToolStatus::from_code(status.code())))
            }
            OutputMode::Capture => {
                let output = process.output()?;
                Ok(ToolOutput {
                    status: ToolStatus::from_code(output.status.code()),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
        }
    }
}

/// Uniform wrapper that turns tool exits into stage results.
pub struct Toolchain<'a> {
    runner: &'a dyn ToolRunner,
}

impl<'a> Toolchain<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        Toolchain { runner }
    }

    /// Run a stage with output forwarded to the terminal; nonzero exit is an error.
    pub fn invoke(&self, stage: &Stage) -> Result<ToolOutput, BuildError> {
        let output = self.probe(stage, OutputMode::Forward)?;
        Self::require_success(stage, output)
    }

    /// Run a stage capturing its stdout/stderr; nonzero exit is an error.
    pub fn capture(&self, stage: &Stage) -> Result<ToolOutput, BuildError> {
        let output = self.probe(stage, OutputMode::Capture)?;
        Self::require_success(stage, output)
    }

    /// Run a stage and hand back its status whatever it is.
    ///
    /// Only spawn failures are errors here; callers that give a nonzero exit a
    /// specific meaning (the multiboot check, the emulator) interpret it themselves.
    pub fn probe(&self, stage: &Stage, mode: OutputMode) -> Result<ToolOutput, BuildError> {
        log::debug!(
            "[{}] {} (cwd: {})",
            stage.kind,
            stage.command.command_line(),
            stage.command.cwd.display()
        );

        let output = self
            .runner
            .run(&stage.command, mode)
            .map_err(|source| BuildError::ToolSpawn {
                stage: stage.kind,
                program: stage.command.program.clone(),
                source,
            })?;

        if !output.stderr.is_empty() {
            log::debug!("[{}] stderr: {}", stage.kind, output.stderr.trim_end());
        }
        Ok(output)
    }

    fn require_success(stage: &Stage, output: ToolOutput) -> Result<ToolOutput, BuildError> {
        if output.status.success() {
            return Ok(output);
        }
        log::error!(
            "[{}] `{}` exited with {}",
            stage.kind,
            stage.command.program,
            output.status
        );
        Err(tool_failure(stage.kind, &stage.command.program, output.status))
    }
}

fn tool_failure(stage: StageKind, program: &str, status: ToolStatus) -> BuildError {
    BuildError::ToolInvocation {
        stage,
        program: program.to_string(),
        status,
    }
}
