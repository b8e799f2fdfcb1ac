//! Error types for the slot image engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Slot id not present in the active table. Indicates a configuration bug.
    #[error("Unknown slot: {0}")]
    UnknownSlot(String),

    #[error("Invalid slot table: {0}")]
    InvalidSlotTable(String),

    /// Malformed or zero-dimension payload for one slot.
    #[error("Invalid image for slot {slot_id}: {reason}")]
    InvalidImage { slot_id: String, reason: String },

    #[error("{}", incomplete_message(.missing, .unmet_groups))]
    IncompleteSubmission {
        missing: Vec<String>,
        unmet_groups: Vec<Vec<String>>,
    },

    #[error("Name prefix must not be empty")]
    EmptyNamePrefix,

    #[error("Failed to encode slot {slot_id}: {reason}")]
    EncodeFailed { slot_id: String, reason: String },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn invalid_image(slot_id: &str, reason: impl ToString) -> Self {
        Self::InvalidImage {
            slot_id: slot_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn incomplete_message(missing: &[String], unmet_groups: &[Vec<String>]) -> String {
    let mut parts = vec![];
    if !missing.is_empty() {
        parts.push(format!("Missing required slots: {}", missing.join(", ")));
    }
    for group in unmet_groups {
        parts.push(format!("At least one of {} is required", group.join(", ")));
    }
    format!("Incomplete submission: {}", parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_message_lists_everything() {
        let err = PipelineError::IncompleteSubmission {
            missing: vec!["Concept_1".into(), "Menu_1".into()],
            unmet_groups: vec![vec!["Chef_1".into(), "Chef_2".into()]],
        };
        let msg = err.to_string();
        assert!(msg.contains("Concept_1, Menu_1"));
        assert!(msg.contains("At least one of Chef_1, Chef_2"));
    }
}
