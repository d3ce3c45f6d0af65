//! Enrollment anchors and roster selection for bulk operations.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::object_id::normalize_object_id;
use crate::types::{DbId, Timestamp};

/// Maximum number of explicit student ids in one bulk request.
pub const MAX_ROSTER_SIZE: usize = 1_000;

/// A student's enrollment in a mission, as supplied by the roster collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub mission_id: DbId,
    pub student_id: DbId,
    /// First instant from which attendance may be recorded.
    pub started_at: Timestamp,
    pub mentorship_group_id: Option<DbId>,
}

/// Which students a bulk operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterSelector {
    /// Every current member of a mentorship group.
    Group(DbId),
    /// Exactly these students, de-duplicated, in first-seen order.
    Students(Vec<DbId>),
}

impl RosterSelector {
    /// Build a selector from optional request fields.
    ///
    /// When both are supplied the group wins. At least one is required and an
    /// explicit list must be non-empty.
    pub fn from_parts(
        mentorship_group_id: Option<&str>,
        student_ids: Option<&[String]>,
    ) -> Result<Self, String> {
        if let Some(group_id) = mentorship_group_id {
            return Ok(Self::Group(normalize_object_id("mentorship_group_id", group_id)?));
        }

        let Some(ids) = student_ids else {
            return Err("Either mentorship_group_id or student_ids is required".to_string());
        };
        if ids.is_empty() {
            return Err("student_ids cannot be empty".to_string());
        }
        if ids.len() > MAX_ROSTER_SIZE {
            return Err(format!("student_ids exceeds maximum of {MAX_ROSTER_SIZE} entries"));
        }

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(ids.len());
        for raw in ids {
            let id = normalize_object_id("student_ids", raw)?;
            if seen.insert(id.clone()) {
                unique.push(id);
            }
        }
        Ok(Self::Students(unique))
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            Self::Group(id) => Some(id),
            Self::Students(_) => None,
        }
    }
}
