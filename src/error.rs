//! Unified error type hierarchy for the KiwiOS builder.
//!
//! Provides structured error handling with ConfigError for settings resolution
//! and BuildError for everything that can abort a pipeline run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{StageKind, ToolStatus};

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid TOML in config: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unknown build profile '{0}'")]
    UnknownProfile(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Errors that abort a build run.
///
/// Every variant is fatal: the pipeline never retries and never continues past
/// the stage that produced it.
#[derive(Error, Debug)]
pub enum BuildError {
    /// An external tool ran and exited unsuccessfully.
    #[error("{stage} stage failed: `{program}` exited with {status}")]
    ToolInvocation {
        stage: StageKind,
        program: String,
        status: ToolStatus,
    },

    /// An external tool could not be started at all (not installed, not executable).
    #[error("{stage} stage could not start `{program}`: {source}")]
    ToolSpawn {
        stage: StageKind,
        program: String,
        #[source]
        source: io::Error,
    },

    /// The linked binary is not a conformant multiboot image.
    #[error(
        "{} is not a bootable multiboot image (validator exited with {status}); check the linker script and multiboot header",
        .binary.display()
    )]
    Validation { binary: PathBuf, status: ToolStatus },

    #[error("Failed to {action} {}: {source}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        /// Set when the failure happened while a stage was running.
        stage: Option<StageKind>,
        #[source]
        source: io::Error,
    },

    /// A required input is absent before any tool has run.
    #[error("Missing {what}: {}", .path.display())]
    MissingInput { what: &'static str, path: PathBuf },

    #[error("Runtime support library unavailable: {0}")]
    RuntimeSupport(String),

    #[error("Invalid stage transition: {0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BuildError {
    /// Wrap an io::Error with the action and path that produced it.
    pub fn filesystem(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Filesystem {
            action,
            path: path.into(),
            stage: None,
            source,
        }
    }

    /// Attribute a filesystem failure to the stage that was running.
    pub fn in_stage(self, kind: StageKind) -> Self {
        match self {
            BuildError::Filesystem {
                action,
                path,
                stage: None,
                source,
            } => BuildError::Filesystem {
                action,
                path,
                stage: Some(kind),
                source,
            },
            other => other,
        }
    }

    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            BuildError::ToolInvocation { stage, .. } | BuildError::ToolSpawn { stage, .. } => {
                Some(*stage)
            }
            BuildError::Validation { .. } => Some(StageKind::Validate),
            BuildError::Filesystem { stage, .. } => *stage,
            BuildError::RuntimeSupport(_) => Some(StageKind::Discover),
            _ => None,
        }
    }

    /// Process exit code for this failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Config(_) => 2,
            BuildError::Filesystem { .. } | BuildError::MissingInput { .. } => 3,
            BuildError::ToolInvocation { .. } | BuildError::ToolSpawn { .. } => 4,
            BuildError::Validation { .. } => 5,
            BuildError::RuntimeSupport(_) => 6,
            BuildError::InvalidTransition(_) => 70,
        }
    }
}
