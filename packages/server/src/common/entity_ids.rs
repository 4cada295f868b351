//! Typed ID definitions for domain entities.
//!
//! ```rust
//! use ingest_core::common::{ImportRunId, NovelId};
//!
//! let run_id = ImportRunId::new();
//! let novel_id = NovelId::new();
//!
//! // Compile error:
//! // let wrong: NovelId = run_id;
//! ```

use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for imported novels.
pub struct Novel;

/// Marker type for chapters of a novel.
pub struct Chapter;

/// Marker type for user-submitted novel proposals.
pub struct Proposal;

/// Marker type for import runs.
pub struct ImportRun;

/// Marker type for platform users.
pub struct User;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type NovelId = Id<Novel>;

pub type ChapterId = Id<Chapter>;

pub type ProposalId = Id<Proposal>;

/// Stable across pause/resume of the same run.
pub type ImportRunId = Id<ImportRun>;

pub type UserId = Id<User>;
