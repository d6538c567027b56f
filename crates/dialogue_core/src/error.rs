use thiserror::Error;

/// Errors raised while loading a dialogue or handling a user action.
#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("branch not found")]
    BranchNotFound,

    #[error("question {question} is out of range for branch '{branch}'")]
    QuestionOutOfRange { branch: String, question: usize },

    #[error("option {option} is out of range for branch '{branch}'")]
    OptionOutOfRange { branch: String, option: usize },

    #[error("choice for branch '{branch}' arrived before its diagnosis")]
    ChoiceBeforeFinal { branch: String },

    #[error("invalid dialogue: {0}")]
    InvalidDialogue(String),

    #[error("failed to parse dialogue: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read dialogue: {0}")]
    Io(#[from] std::io::Error),

    #[error("conversation store error: {0}")]
    Store(String),
}

impl DialogueError {
    /// True when the action could not be mapped to a position in the dialogue.
    ///
    /// These are surfaced to the user as "start over" prompts; everything else
    /// gets the generic apology.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::BranchNotFound
                | Self::QuestionOutOfRange { .. }
                | Self::OptionOutOfRange { .. }
                | Self::ChoiceBeforeFinal { .. }
        )
    }
}

pub type Result<T, E = DialogueError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_failures_are_classified() {
        assert!(DialogueError::BranchNotFound.is_resolution_failure());
        assert!(DialogueError::OptionOutOfRange {
            branch: "client".to_string(),
            option: 9,
        }
        .is_resolution_failure());
        assert!(DialogueError::ChoiceBeforeFinal {
            branch: "client".to_string(),
        }
        .is_resolution_failure());
        assert!(!DialogueError::Store("down".to_string()).is_resolution_failure());
    }
}
