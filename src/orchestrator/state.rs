//! Stage state tracking for a pipeline run.
//!
//! Each stage moves `Pending -> Running -> Succeeded | Failed`, or
//! `Pending -> Skipped` when its opt-in flag is off. A stage may only start
//! once every earlier stage has succeeded or been skipped, and nothing starts
//! after a failure.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::models::{StageKind, StageOutcome, StageRecord, ToolStatus};

/// Lifecycle of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Succeeded => "succeeded",
            StageState::Failed => "failed",
            StageState::Skipped => "skipped",
        }
    }

    /// Get all valid transitions FROM this state.
    pub fn valid_next_states(&self) -> Vec<StageState> {
        match self {
            StageState::Pending => vec![StageState::Running, StageState::Skipped],
            StageState::Running => vec![StageState::Succeeded, StageState::Failed],
            StageState::Succeeded | StageState::Failed | StageState::Skipped => vec![],
        }
    }

    pub fn can_transition_to(&self, next: StageState) -> bool {
        self.valid_next_states().contains(&next)
    }

    /// Whether a later stage may start after this one.
    pub fn clears_the_way(&self) -> bool {
        matches!(self, StageState::Succeeded | StageState::Skipped)
    }
}

#[derive(Debug, Clone)]
struct StageEntry {
    kind: StageKind,
    state: StageState,
    status: Option<ToolStatus>,
    started_at: Option<DateTime<Local>>,
    duration_ms: i64,
}

/// State of all seven stages for one run.
#[derive(Debug, Clone)]
pub struct PipelineState {
    entries: Vec<StageEntry>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    pub fn new() -> Self {
        PipelineState {
            entries: StageKind::ALL
                .iter()
                .map(|kind| StageEntry {
                    kind: *kind,
                    state: StageState::Pending,
                    status: None,
                    started_at: None,
                    duration_ms: 0,
                })
                .collect(),
        }
    }

    pub fn state_of(&self, kind: StageKind) -> StageState {
        self.entry(kind).state
    }

    /// Mark a stage as running. Every earlier stage must have cleared the way.
    pub fn begin(&mut self, kind: StageKind) -> Result<(), BuildError> {
        if let Some(blocker) = self
            .entries
            .iter()
            .take_while(|e| e.kind != kind)
            .find(|e| !e.state.clears_the_way())
        {
            return Err(BuildError::InvalidTransition(format!(
                "{} cannot start while {} is {}",
                kind,
                blocker.kind,
                blocker.state.as_str()
            )));
        }
        self.transition(kind, StageState::Running)?;
        self.entry_mut(kind).started_at = Some(Local::now());
        Ok(())
    }

    pub fn succeed(&mut self, kind: StageKind, status: Option<ToolStatus>) -> Result<(), BuildError> {
        self.finish(kind, StageState::Succeeded, status)
    }

    pub fn fail(&mut self, kind: StageKind, status: Option<ToolStatus>) -> Result<(), BuildError> {
        self.finish(kind, StageState::Failed, status)
    }

    /// Only opt-in stages can be skipped.
    pub fn skip(&mut self, kind: StageKind) -> Result<(), BuildError> {
        if !kind.is_conditional() {
            return Err(BuildError::InvalidTransition(format!(
                "{} always runs and cannot be skipped",
                kind
            )));
        }
        self.transition(kind, StageState::Skipped)
    }

    /// Records for the stages that have reached a final state, in order.
    pub fn records(&self) -> Vec<StageRecord> {
        self.entries
            .iter()
            .filter_map(|e| {
                let outcome = match e.state {
                    StageState::Succeeded => StageOutcome::Succeeded,
                    StageState::Failed => StageOutcome::Failed,
                    StageState::Skipped => StageOutcome::Skipped,
                    StageState::Pending | StageState::Running => return None,
                };
                Some(StageRecord {
                    stage: e.kind,
                    outcome,
                    status: e.status,
                    duration_ms: e.duration_ms,
                })
            })
            .collect()
    }

    fn finish(
        &mut self,
        kind: StageKind,
        next: StageState,
        status: Option<ToolStatus>,
    ) -> Result<(), BuildError> {
        self.transition(kind, next)?;
        let entry = self.entry_mut(kind);
        entry.status = status;
        if let Some(started) = entry.started_at {
            entry.duration_ms = (Local::now() - started).num_milliseconds();
        }
        Ok(())
    }

    fn transition(&mut self, kind: StageKind, next: StageState) -> Result<(), BuildError> {
        let entry = self.entry_mut(kind);
        if !entry.state.can_transition_to(next) {
            return Err(BuildError::InvalidTransition(format!(
                "{}: {} -> {}",
                kind,
                entry.state.as_str(),
                next.as_str()
            )));
        }
        entry.state = next;
        Ok(())
    }

    fn entry(&self, kind: StageKind) -> &StageEntry {
        // StageKind::ALL seeds one entry per variant, in declaration order.
        &self.entries[kind as usize]
    }

    fn entry_mut(&mut self, kind: StageKind) -> &mut StageEntry {
        &mut self.entries[kind as usize]
    }
}
