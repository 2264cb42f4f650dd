//! Filesystem phases around the tool stages.
//!
//! - `prep`: input preflight, shallow clean, static resource copy
//! - `package`: rescue-image staging tree

pub mod package;
pub mod prep;

pub use package::stage_iso_tree;
pub use prep::{copy_static_files, preflight, prepare_workspace, shallow_clean, CleanSummary};
