//! Conversation state - where a user is in the dialogue tree

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dialogue::Messages;

/// Position of a user inside the dialogue.
///
/// Serialized as `menu`, `q_<n>` or `final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Stage {
    #[default]
    Menu,
    Question(usize),
    Final,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Menu => f.write_str("menu"),
            Self::Question(index) => write!(f, "q_{}", index),
            Self::Final => f.write_str("final"),
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "menu" => Ok(Self::Menu),
            "final" => Ok(Self::Final),
            other => other
                .strip_prefix("q_")
                .and_then(|index| index.parse().ok())
                .map(Self::Question)
                .ok_or_else(|| format!("unknown stage '{}'", other)),
        }
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.to_string()
    }
}

impl TryFrom<String> for Stage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
}

impl AnswerRecord {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Per-user mutable record. `branch` indexes the dialogue's branch list and
/// is set whenever `stage` is not `Menu`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub stage: Stage,
    #[serde(default)]
    pub branch: Option<usize>,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(default)]
    pub final_choice: Option<String>,
    #[serde(default)]
    pub group_choice: Option<String>,
}

impl ConversationState {
    pub fn menu() -> Self {
        Self::default()
    }

    pub fn for_branch(branch: usize) -> Self {
        Self {
            stage: Stage::Question(0),
            branch: Some(branch),
            ..Self::default()
        }
    }

    /// Points the state at `branch`. Switching away from another branch drops
    /// everything recorded for it.
    pub fn rebind(&mut self, branch: usize) {
        if self.branch == Some(branch) {
            return;
        }
        if self.branch.is_some() {
            self.answers.clear();
            self.final_choice = None;
            self.group_choice = None;
        }
        self.branch = Some(branch);
    }

    /// Answers plus the post-diagnosis and group choices as extra rows.
    pub fn enriched_answers(&self, messages: &Messages) -> Vec<AnswerRecord> {
        let mut rows = self.answers.clone();
        if let Some(choice) = &self.final_choice {
            rows.push(AnswerRecord::new(&messages.final_choice_label, choice));
        }
        if let Some(group) = &self.group_choice {
            rows.push(AnswerRecord::new(&messages.group_choice_label, group));
        }
        rows
    }
}
