//! Dialogue definition - the static questionnaire content
//!
//! A dialogue is plain data: a greeting, a list of branches and the service
//! texts the engine needs. It is loaded from TOML and validated once at
//! startup, so the engine can index into it without further checks.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DialogueError, Result};
use crate::payload::{CallbackPayload, MAX_PAYLOAD_LEN};

const BUILTIN_DIALOGUE: &str = include_str!("../dialogue.toml");

/// A single question, identified only by its position inside a branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
}

/// Secondary menu shown after some post-final choices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMenu {
    pub text: String,
    pub options: Vec<String>,
    /// Final-option texts that open this menu instead of finalizing.
    #[serde(default)]
    pub triggers: Vec<String>,
}

/// One complete question sequence and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branch {
    pub key: String,
    pub label: String,
    pub questions: Vec<Question>,
    pub diagnosis: String,
    #[serde(default)]
    pub final_options: Vec<String>,
    #[serde(default)]
    pub delayed: Option<String>,
    #[serde(default)]
    pub group_menu: Option<GroupMenu>,
}

impl Branch {
    pub fn has_final_options(&self) -> bool {
        !self.final_options.is_empty()
    }

    /// Returns the group menu when `choice` is one of its triggers.
    pub fn group_menu_for(&self, choice: &str) -> Option<&GroupMenu> {
        self.group_menu
            .as_ref()
            .filter(|menu| menu.triggers.iter().any(|trigger| trigger == choice))
    }
}

/// User-facing service texts. Every field has a default so a dialogue file
/// only needs to override what it wants to change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Messages {
    pub help: String,
    pub fallback: String,
    pub branch_not_found: String,
    pub generic_error: String,
    pub thank_you: String,
    pub delivery_failed: String,
    pub final_prompt: String,
    pub final_choice_label: String,
    pub group_choice_label: String,
    pub already_recorded: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            help: "Используйте /start для начала диагностики. Если возникли проблемы, начните заново с команды /start.".to_string(),
            fallback: "Используйте кнопки для навигации или команду /start для начала.".to_string(),
            branch_not_found: "Ошибка: ветка не найдена. Начните заново с команды /start.".to_string(),
            generic_error: "Произошла ошибка. Попробуйте начать заново с команды /start".to_string(),
            thank_you: "Спасибо! Ваши ответы записаны и отправлены для обработки.".to_string(),
            delivery_failed: "Ваши ответы записаны, но возникла проблема с отправкой. Мы свяжемся с вами.".to_string(),
            final_prompt: "Что вы хотите сделать дальше?".to_string(),
            final_choice_label: "Выбор после диагностики".to_string(),
            group_choice_label: "Выбранная группа".to_string(),
            already_recorded: "Ваш выбор уже записан. Чтобы пройти диагностику заново, используйте /start.".to_string(),
        }
    }
}

/// The whole questionnaire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dialogue {
    pub greeting: String,
    #[serde(default)]
    pub messages: Messages,
    pub branches: Vec<Branch>,
}

impl Dialogue {
    /// The dialogue compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_DIALOGUE)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let dialogue: Dialogue = toml::from_str(content)?;
        dialogue.validate()?;
        Ok(dialogue)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn branch(&self, index: usize) -> Option<&Branch> {
        self.branches.get(index)
    }

    pub fn branch_index(&self, key: &str) -> Option<usize> {
        self.branches.iter().position(|branch| branch.key == key)
    }

    /// First branch whose question at `question` has exactly `text`.
    pub fn find_by_question_text(&self, question: usize, text: &str) -> Option<usize> {
        self.branches.iter().position(|branch| {
            branch
                .questions
                .get(question)
                .is_some_and(|q| q.text == text)
        })
    }

    /// First branch whose post-final prompt (`delayed`) is exactly `text`.
    pub fn find_by_delayed_text(&self, text: &str) -> Option<usize> {
        self.branches
            .iter()
            .position(|branch| branch.delayed.as_deref() == Some(text))
    }

    /// Checks the invariants the engine relies on.
    ///
    /// Text-matching recovery needs question texts to be unique per position
    /// and `delayed` texts to be unique overall; every generated callback
    /// payload has to fit the platform limit.
    pub fn validate(&self) -> Result<()> {
        if self.branches.is_empty() {
            return Err(invalid("dialogue has no branches"));
        }

        let mut keys = HashSet::new();
        let mut delayed_texts = HashSet::new();
        let mut question_texts: HashSet<(usize, &str)> = HashSet::new();

        for branch in &self.branches {
            validate_key(&branch.key)?;
            if !keys.insert(branch.key.as_str()) {
                return Err(invalid(format!("duplicate branch key '{}'", branch.key)));
            }
            if branch.questions.is_empty() {
                return Err(invalid(format!("branch '{}' has no questions", branch.key)));
            }

            for (index, question) in branch.questions.iter().enumerate() {
                if question.options.is_empty() {
                    return Err(invalid(format!(
                        "question {} of branch '{}' has no options",
                        index, branch.key
                    )));
                }
                if !question_texts.insert((index, question.text.as_str())) {
                    return Err(invalid(format!(
                        "question text at position {} is not unique: '{}'",
                        index, question.text
                    )));
                }
                let widest = CallbackPayload::Answer {
                    branch: Some(branch.key.clone()),
                    question: index,
                    option: question.options.len() - 1,
                };
                check_payload_len(&widest)?;
            }

            if let Some(delayed) = branch.delayed.as_deref() {
                if !delayed_texts.insert(delayed) {
                    return Err(invalid(format!("duplicate delayed text in '{}'", branch.key)));
                }
            }

            if branch.has_final_options() {
                check_payload_len(&CallbackPayload::PostFinal {
                    branch: branch.key.clone(),
                    option: branch.final_options.len() - 1,
                })?;
            }

            if let Some(menu) = &branch.group_menu {
                if menu.options.is_empty() {
                    return Err(invalid(format!(
                        "group menu of branch '{}' has no options",
                        branch.key
                    )));
                }
                if let Some(trigger) = menu
                    .triggers
                    .iter()
                    .find(|trigger| !branch.final_options.contains(trigger))
                {
                    return Err(invalid(format!(
                        "group trigger '{}' of branch '{}' is not a final option",
                        trigger, branch.key
                    )));
                }
                check_payload_len(&CallbackPayload::Group {
                    branch: branch.key.clone(),
                    option: menu.options.len() - 1,
                })?;
            }
        }

        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    let well_formed = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(invalid(format!("branch key '{}' is not [A-Za-z0-9_-]+", key)))
    }
}

fn check_payload_len(payload: &CallbackPayload) -> Result<()> {
    let encoded = payload.encode();
    if encoded.len() > MAX_PAYLOAD_LEN {
        return Err(invalid(format!(
            "callback payload '{}' exceeds {} bytes",
            encoded, MAX_PAYLOAD_LEN
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> DialogueError {
    DialogueError::InvalidDialogue(message.into())
}
