//! Branch resolution for context-free events
//!
//! Each function tries the most specific evidence first and falls back to
//! matching the text of the message the button was attached to. First match
//! wins; dialogue validation keeps those texts unique.

use crate::dialogue::Dialogue;

fn known_key(dialogue: &Dialogue, key: Option<&str>) -> Option<usize> {
    key.and_then(|key| dialogue.branch_index(key))
}

fn has_question(dialogue: &Dialogue, branch: usize, question: usize) -> bool {
    dialogue
        .branch(branch)
        .is_some_and(|branch| question < branch.questions.len())
}

/// Payload key, then stored branch, then the question text at `question`.
pub(super) fn answer_branch(
    dialogue: &Dialogue,
    hint: Option<&str>,
    stored: Option<usize>,
    question: usize,
    source_text: Option<&str>,
) -> Option<usize> {
    known_key(dialogue, hint)
        .into_iter()
        .chain(stored)
        .find(|&branch| has_question(dialogue, branch, question))
        .or_else(|| source_text.and_then(|text| dialogue.find_by_question_text(question, text)))
}

/// Payload key, then the `delayed` text of the prompt, then stored branch.
pub(super) fn post_final_branch(
    dialogue: &Dialogue,
    hint: Option<&str>,
    source_text: Option<&str>,
    stored: Option<usize>,
) -> Option<usize> {
    known_key(dialogue, hint)
        .or_else(|| source_text.and_then(|text| dialogue.find_by_delayed_text(text)))
        .or_else(|| stored.filter(|&branch| dialogue.branch(branch).is_some()))
}

/// Payload key, then stored branch.
pub(super) fn group_branch(
    dialogue: &Dialogue,
    hint: Option<&str>,
    stored: Option<usize>,
) -> Option<usize> {
    known_key(dialogue, hint).or_else(|| stored.filter(|&branch| dialogue.branch(branch).is_some()))
}
