//! Core data types for the KiwiOS builder.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The fixed build stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Assemble,
    Compile,
    Discover,
    Link,
    Validate,
    Package,
    Launch,
}

impl StageKind {
    /// Every stage in execution order.
    pub const ALL: [StageKind; 7] = [
        StageKind::Assemble,
        StageKind::Compile,
        StageKind::Discover,
        StageKind::Link,
        StageKind::Validate,
        StageKind::Package,
        StageKind::Launch,
    ];

    /// Human-readable label used in progress messages.
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Assemble => "Assembling boot stub",
            StageKind::Compile => "Compiling kernel",
            StageKind::Discover => "Retrieving compiler runtime directory",
            StageKind::Link => "Linking kernel image",
            StageKind::Validate => "Checking multiboot compliance",
            StageKind::Package => "Building the ISO",
            StageKind::Launch => "Launching emulator",
        }
    }

    /// Whether the stage only runs when explicitly requested.
    pub fn is_conditional(&self) -> bool {
        matches!(self, StageKind::Package | StageKind::Launch)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Assemble => "Assemble",
            StageKind::Compile => "Compile",
            StageKind::Discover => "Discover",
            StageKind::Link => "Link",
            StageKind::Validate => "Validate",
            StageKind::Package => "Package",
            StageKind::Launch => "Launch",
        };
        f.write_str(name)
    }
}

/// How an external tool finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Exited(i32),
    /// Killed by a signal, no exit code available.
    Signaled,
}

impl ToolStatus {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(code) => ToolStatus::Exited(code),
            None => ToolStatus::Signaled,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, ToolStatus::Exited(0))
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Exited(code) => write!(f, "status {}", code),
            ToolStatus::Signaled => f.write_str("no status (terminated by signal)"),
        }
    }
}

/// Whether a tool's stdout/stderr is captured for the caller or forwarded to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Forward,
    Capture,
}

/// A fully specified external command: program, arguments and working directory.
///
/// The working directory is always explicit; the builder never changes its own
/// current directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        ToolCommand {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    /// Shell-like rendering for log output.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Result of one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub status: ToolStatus,
    /// Empty unless the command ran with `OutputMode::Capture`.
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn with_status(status: ToolStatus) -> Self {
        ToolOutput {
            status,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// One named unit of work in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub kind: StageKind,
    pub command: ToolCommand,
}

impl Stage {
    pub fn new(kind: StageKind, command: ToolCommand) -> Self {
        Stage { kind, command }
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

/// Files materialized in the output directory during a run.
///
/// Grows monotonically: stages only ever add entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub copied: Vec<PathBuf>,
    pub boot_object: Option<PathBuf>,
    pub kernel_object: Option<PathBuf>,
    pub binary: Option<PathBuf>,
    pub iso_staging: Option<PathBuf>,
    pub iso_image: Option<PathBuf>,
}

/// Final status of a stage as recorded in the build report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// Per-stage entry in the build report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolStatus>,
    pub duration_ms: i64,
}

/// What happened to the optional emulator launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOutcome {
    NotRequested,
    Exited,
    Failed(ToolStatus),
    /// The emulator could not be spawned at all.
    NotStarted,
}

/// Summary of a successful build, also persisted as `build-report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub profile: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub stages: Vec<StageRecord>,
    pub artifacts: ArtifactSet,
    pub launch: LaunchOutcome,
}

impl BuildReport {
    /// Stages that actually executed, in order.
    pub fn executed_stages(&self) -> Vec<StageKind> {
        self.stages
            .iter()
            .filter(|record| record.outcome != StageOutcome::Skipped)
            .map(|record| record.stage)
            .collect()
    }
}
