//! Resumable import cursor persisted on the run row.
//!
//! Stored as camelCase JSON. Rows written before the `version` field existed
//! decode as version 1, and a nil novel id decodes as "no novel yet".

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::NovelId;

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid checkpoint: {0}")]
    Invalid(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(default)]
    pub novel_id: Option<NovelId>,
    #[serde(default)]
    pub slug: String,
    /// 0-based index of the next chapter to fetch.
    #[serde(default)]
    pub next_index: usize,
    #[serde(default)]
    pub total_chapters: usize,
}

fn legacy_version() -> u32 {
    1
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            novel_id: None,
            slug: String::new(),
            next_index: 0,
            total_chapters: 0,
        }
    }
}

impl Checkpoint {
    /// Decode a stored checkpoint. `null` and `{}` mean there is none.
    pub fn decode(value: &serde_json::Value) -> Result<Option<Self>, CheckpointError> {
        match value {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Object(map) if map.is_empty() => return Ok(None),
            _ => {}
        }

        let mut checkpoint: Self = serde_json::from_value(value.clone())?;
        if checkpoint.version > CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        if checkpoint.novel_id.is_some_and(|id| id.is_nil()) {
            checkpoint.novel_id = None;
        }
        checkpoint.version = CHECKPOINT_VERSION;
        Ok(Some(checkpoint))
    }

    pub fn encode(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Record the discovered chapter count and keep `next_index` within it.
    pub fn set_total(&mut self, total: usize) {
        self.total_chapters = total;
        self.next_index = self.next_index.min(total);
    }

    pub fn is_complete(&self) -> bool {
        self.next_index >= self.total_chapters
    }

    pub fn remaining(&self) -> usize {
        self.total_chapters.saturating_sub(self.next_index)
    }
}
