//! Dialogue engine - interprets user actions against conversation state
//!
//! Every event arrives on its own, without context, and the stored state may
//! be gone (process recycle, another instance). Every transition that needs
//! "which branch / which question" is therefore reconstructible from the event
//! alone: the index carried by the button payload and the text of the message
//! the button was attached to.
//!
//! Per user: `menu -> q_0 -> ... -> q_{n-1} -> final`; `/start` always goes
//! back to `menu`. An action that cannot be placed in the dialogue leaves the
//! state untouched and asks the user to start over.

mod event;
mod outbound;
mod resolve;

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::dialogue::{Branch, Dialogue, GroupMenu};
use crate::error::{DialogueError, Result};
use crate::payload::CallbackPayload;
use crate::ports::{FollowUp, FollowUpScheduler, ResultExporter, SurveyReport};
use crate::state::{AnswerRecord, ConversationState, Stage};
use crate::store::ConversationStore;

pub use event::{Action, InboundEvent, SourceMessage, UserIdentity};
pub use outbound::{Button, Keyboard, Outbound};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// When set, branches with final options are finalized right after the
    /// diagnosis and the post-final prompt is scheduled this far ahead.
    pub follow_up_delay: Option<Duration>,
    /// Emit `answer_<branchKey>_<q>_<o>` instead of `answer_<q>_<o>`.
    pub embed_branch_in_payload: bool,
}

pub struct DialogueEngine {
    dialogue: Arc<Dialogue>,
    store: Arc<dyn ConversationStore>,
    exporter: Arc<dyn ResultExporter>,
    scheduler: Option<Arc<dyn FollowUpScheduler>>,
    config: EngineConfig,
    user_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl DialogueEngine {
    pub fn new(
        dialogue: Arc<Dialogue>,
        store: Arc<dyn ConversationStore>,
        exporter: Arc<dyn ResultExporter>,
    ) -> Self {
        Self {
            dialogue,
            store,
            exporter,
            scheduler: None,
            config: EngineConfig::default(),
            user_locks: DashMap::new(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn FollowUpScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle one event and return what should be sent back.
    ///
    /// Never fails: errors become a short prompt for the user. Events of the
    /// same user are processed one at a time.
    pub async fn handle(&self, event: InboundEvent) -> Vec<Outbound> {
        let user_id = event.user.id;
        let lock = self.user_lock(user_id);
        let outbound = {
            let _guard = lock.lock().await;
            self.respond(&event).await
        };
        drop(lock);
        self.release_lock(user_id);
        outbound
    }

    async fn respond(&self, event: &InboundEvent) -> Vec<Outbound> {
        let user_id = event.user.id;
        match self.dispatch(event).await {
            Ok(outbound) => outbound,
            Err(err) if err.is_resolution_failure() => {
                warn!(user_id, action = ?event.action, "Could not place action in dialogue: {}", err);
                vec![Outbound::send(&self.dialogue.messages.branch_not_found)]
            }
            Err(err) => {
                error!(user_id, action = ?event.action, "Dialogue action failed: {}", err);
                vec![Outbound::send(&self.dialogue.messages.generic_error)]
            }
        }
    }

    fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the user's lock once no other event holds or waits on it.
    fn release_lock(&self, user_id: i64) {
        self.user_locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn dispatch(&self, event: &InboundEvent) -> Result<Vec<Outbound>> {
        match &event.action {
            Action::Start => self.on_start(event).await,
            Action::Help => Ok(vec![Outbound::send(&self.dialogue.messages.help)]),
            Action::Text => Ok(vec![Outbound::send(&self.dialogue.messages.fallback)]),
            Action::SelectBranch { key } => self.on_select_branch(event, key).await,
            Action::SelectAnswer {
                branch,
                question,
                option,
            } => {
                self.on_select_answer(event, branch.as_deref(), *question, *option)
                    .await
            }
            Action::SelectPostFinal { branch, option } => {
                self.on_select_post_final(event, branch.as_deref(), *option)
                    .await
            }
            Action::SelectGroup { branch, option } => {
                self.on_select_group(event, branch.as_deref(), *option).await
            }
        }
    }

    async fn on_start(&self, event: &InboundEvent) -> Result<Vec<Outbound>> {
        self.store
            .save(event.user.id, ConversationState::menu())
            .await?;
        info!(user_id = event.user.id, "Conversation started");

        let keyboard = Keyboard::single_column(self.dialogue.branches.iter().map(|branch| {
            (
                branch.label.clone(),
                CallbackPayload::Branch {
                    key: branch.key.clone(),
                },
            )
        }));
        Ok(vec![Outbound::send_with(&self.dialogue.greeting, keyboard)])
    }

    async fn on_select_branch(&self, event: &InboundEvent, key: &str) -> Result<Vec<Outbound>> {
        let index = self
            .dialogue
            .branch_index(key)
            .ok_or(DialogueError::BranchNotFound)?;
        let branch = &self.dialogue.branches[index];
        let first = question_at(branch, 0)?;

        self.store
            .save(event.user.id, ConversationState::for_branch(index))
            .await?;
        info!(user_id = event.user.id, branch = %branch.key, "Branch selected");

        Ok(vec![replace_prompt(
            event,
            &first.text,
            self.question_keyboard(branch, 0),
        )])
    }

    async fn on_select_answer(
        &self,
        event: &InboundEvent,
        hint: Option<&str>,
        question: usize,
        option: usize,
    ) -> Result<Vec<Outbound>> {
        let started = Instant::now();
        let user_id = event.user.id;
        let mut state = self.store.load(user_id).await?.unwrap_or_default();

        let index = resolve::answer_branch(
            &self.dialogue,
            hint,
            state.branch,
            question,
            event.source_text(),
        )
        .ok_or(DialogueError::BranchNotFound)?;
        if state.branch != Some(index) {
            info!(user_id, branch = %self.dialogue.branches[index].key, question, "Recovered branch for answer");
        }

        let branch = &self.dialogue.branches[index];
        let asked = question_at(branch, question)?;
        let answer = asked
            .options
            .get(option)
            .ok_or_else(|| DialogueError::OptionOutOfRange {
                branch: branch.key.clone(),
                option,
            })?;

        state.rebind(index);
        state
            .answers
            .push(AnswerRecord::new(&asked.text, answer.as_str()));

        let next = question + 1;
        let mut outbound = Vec::new();

        if let Some(next_question) = branch.questions.get(next) {
            state.stage = Stage::Question(next);
            self.store.save(user_id, state).await?;

            if let Some(message_id) = event.source_id() {
                outbound.push(Outbound::ClearKeyboard { message_id });
                outbound.push(Outbound::Delete { message_id });
            }
            outbound.push(Outbound::send_with(
                &next_question.text,
                self.question_keyboard(branch, next),
            ));
            debug!(user_id, question, elapsed_ms = started.elapsed().as_millis() as u64, "Answer recorded");
            return Ok(outbound);
        }

        state.stage = Stage::Final;
        self.store.save(user_id, state.clone()).await?;
        info!(user_id, branch = %branch.key, answers = state.answers.len(), "Diagnosis reached");

        if let Some(message_id) = event.source_id() {
            outbound.push(Outbound::Delete { message_id });
        }
        outbound.push(Outbound::send(&branch.diagnosis));

        if !branch.has_final_options() {
            outbound.extend(self.finalize(&event.user, branch, &state).await);
            return Ok(outbound);
        }

        let prompt = branch
            .delayed
            .as_deref()
            .unwrap_or(&self.dialogue.messages.final_prompt);

        match (self.config.follow_up_delay, &self.scheduler) {
            (Some(delay), Some(scheduler)) => {
                outbound.extend(self.finalize(&event.user, branch, &state).await);
                scheduler
                    .schedule(FollowUp {
                        user_id,
                        message: prompt.to_string(),
                        options: Some(branch.final_options.clone()),
                        delay,
                    })
                    .await;
            }
            _ => outbound.push(Outbound::send_with(prompt, final_keyboard(branch))),
        }

        debug!(user_id, question, elapsed_ms = started.elapsed().as_millis() as u64, "Answer recorded");
        Ok(outbound)
    }

    async fn on_select_post_final(
        &self,
        event: &InboundEvent,
        hint: Option<&str>,
        option: usize,
    ) -> Result<Vec<Outbound>> {
        let user_id = event.user.id;
        let mut state = self.store.load(user_id).await?.unwrap_or_default();

        let index =
            resolve::post_final_branch(&self.dialogue, hint, event.source_text(), state.branch)
                .ok_or(DialogueError::BranchNotFound)?;
        let branch = &self.dialogue.branches[index];
        let choice = branch
            .final_options
            .get(option)
            .ok_or_else(|| DialogueError::OptionOutOfRange {
                branch: branch.key.clone(),
                option,
            })?;

        ensure_finished(&state, branch)?;
        if state.branch == Some(index) && state.final_choice.is_some() {
            info!(user_id, branch = %branch.key, "Post-final choice already recorded");
            return Ok(vec![Outbound::send(&self.dialogue.messages.already_recorded)]);
        }

        state.rebind(index);
        state.stage = Stage::Final;
        state.final_choice = Some(choice.clone());
        self.store.save(user_id, state.clone()).await?;
        info!(user_id, branch = %branch.key, choice = %choice, "Post-final choice recorded");

        if let Some(menu) = branch.group_menu_for(choice) {
            return Ok(vec![replace_prompt(
                event,
                &menu.text,
                group_keyboard(branch, menu),
            )]);
        }

        let mut outbound = Vec::new();
        if let Some(message_id) = event.source_id() {
            outbound.push(Outbound::Delete { message_id });
        }
        outbound.extend(self.finalize(&event.user, branch, &state).await);
        Ok(outbound)
    }

    async fn on_select_group(
        &self,
        event: &InboundEvent,
        hint: Option<&str>,
        option: usize,
    ) -> Result<Vec<Outbound>> {
        let user_id = event.user.id;
        let mut state = self.store.load(user_id).await?.unwrap_or_default();

        let index = resolve::group_branch(&self.dialogue, hint, state.branch)
            .ok_or(DialogueError::BranchNotFound)?;
        let branch = &self.dialogue.branches[index];
        let group = branch
            .group_menu
            .as_ref()
            .and_then(|menu| menu.options.get(option))
            .ok_or_else(|| DialogueError::OptionOutOfRange {
                branch: branch.key.clone(),
                option,
            })?;

        ensure_finished(&state, branch)?;
        if state.branch == Some(index) && state.group_choice.is_some() {
            info!(user_id, branch = %branch.key, "Group already recorded");
            return Ok(vec![Outbound::send(&self.dialogue.messages.already_recorded)]);
        }

        state.rebind(index);
        state.stage = Stage::Final;
        state.group_choice = Some(group.clone());
        self.store.save(user_id, state.clone()).await?;
        info!(user_id, branch = %branch.key, group = %group, "Group selected");

        let mut outbound = Vec::new();
        if let Some(message_id) = event.source_id() {
            outbound.push(Outbound::Delete { message_id });
        }
        outbound.extend(self.finalize(&event.user, branch, &state).await);
        Ok(outbound)
    }

    /// Export the enriched answers and tell the user how it went.
    async fn finalize(
        &self,
        user: &UserIdentity,
        branch: &Branch,
        state: &ConversationState,
    ) -> Vec<Outbound> {
        let messages = &self.dialogue.messages;
        let report = SurveyReport {
            user_id: user.id,
            username: user.username.clone(),
            branch_label: branch.label.clone(),
            answers: state.enriched_answers(messages),
        };

        match self.exporter.export(&report).await {
            Ok(()) => {
                info!(user_id = user.id, branch = %branch.key, rows = report.answers.len(), "Results exported");
                vec![Outbound::send(&messages.thank_you)]
            }
            Err(err) => {
                error!(user_id = user.id, branch = %branch.key, "Failed to export results: {:#}", err);
                vec![Outbound::send(&messages.delivery_failed)]
            }
        }
    }

    fn question_keyboard(&self, branch: &Branch, question: usize) -> Keyboard {
        let key = self
            .config
            .embed_branch_in_payload
            .then(|| branch.key.clone());
        let options = branch
            .questions
            .get(question)
            .map(|q| q.options.as_slice())
            .unwrap_or_default();

        Keyboard::single_column(options.iter().enumerate().map(|(option, text)| {
            (
                text.clone(),
                CallbackPayload::Answer {
                    branch: key.clone(),
                    question,
                    option,
                },
            )
        }))
    }
}

fn question_at(branch: &Branch, question: usize) -> Result<&crate::dialogue::Question> {
    branch
        .questions
        .get(question)
        .ok_or_else(|| DialogueError::QuestionOutOfRange {
            branch: branch.key.clone(),
            question,
        })
}

/// Choices are only taken once a walk is over. A user who is still answering
/// questions tapped a stale button. Without a stored walk the choice is
/// recovered from the event alone.
fn ensure_finished(state: &ConversationState, branch: &Branch) -> Result<()> {
    match state.stage {
        Stage::Question(_) => Err(DialogueError::ChoiceBeforeFinal {
            branch: branch.key.clone(),
        }),
        Stage::Menu | Stage::Final => Ok(()),
    }
}

fn final_keyboard(branch: &Branch) -> Keyboard {
    Keyboard::single_column(branch.final_options.iter().enumerate().map(|(option, text)| {
        (
            text.clone(),
            CallbackPayload::PostFinal {
                branch: branch.key.clone(),
                option,
            },
        )
    }))
}

fn group_keyboard(branch: &Branch, menu: &GroupMenu) -> Keyboard {
    Keyboard::single_column(menu.options.iter().enumerate().map(|(option, text)| {
        (
            text.clone(),
            CallbackPayload::Group {
                branch: branch.key.clone(),
                option,
            },
        )
    }))
}

/// Edit the message the button was on, or send a new one when there is none.
fn replace_prompt(event: &InboundEvent, text: &str, keyboard: Keyboard) -> Outbound {
    match event.source_id() {
        Some(message_id) => Outbound::Edit {
            message_id,
            text: text.to_string(),
            keyboard: Some(keyboard),
        },
        None => Outbound::send_with(text, keyboard),
    }
}
