//! Engine behaviour across whole conversations
//!
//! Covers the walk-through, recovery, routing and finalization behaviour with
//! recording fakes for the exporter and the follow-up scheduler.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dialogue_core::{
    Action, ConversationState, ConversationStore, Dialogue, DialogueEngine, EngineConfig,
    FollowUp, FollowUpScheduler, InMemoryConversationStore, InboundEvent, Outbound, ResultExporter, Stage,
    SurveyReport, UserIdentity,
};

const USER: i64 = 4242;

#[derive(Default)]
struct RecordingExporter {
    reports: Mutex<Vec<SurveyReport>>,
    fail: bool,
}

impl RecordingExporter {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn reports(&self) -> Vec<SurveyReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultExporter for RecordingExporter {
    async fn export(&self, report: &SurveyReport) -> anyhow::Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        if self.fail {
            anyhow::bail!("smtp unreachable");
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingScheduler {
    jobs: Mutex<Vec<FollowUp>>,
}

#[async_trait]
impl FollowUpScheduler for RecordingScheduler {
    async fn schedule(&self, follow_up: FollowUp) {
        self.jobs.lock().unwrap().push(follow_up);
    }
}

struct Harness {
    engine: DialogueEngine,
    store: Arc<InMemoryConversationStore>,
    exporter: Arc<RecordingExporter>,
    scheduler: Arc<RecordingScheduler>,
    dialogue: Arc<Dialogue>,
}

impl Harness {
    fn new() -> Self {
        Self::with(RecordingExporter::default(), EngineConfig::default())
    }

    fn with(exporter: RecordingExporter, config: EngineConfig) -> Self {
        let dialogue = Arc::new(Dialogue::builtin().unwrap());
        let store = Arc::new(InMemoryConversationStore::new());
        let exporter = Arc::new(exporter);
        let scheduler = Arc::new(RecordingScheduler::default());
        let engine = DialogueEngine::new(dialogue.clone(), store.clone(), exporter.clone())
            .with_scheduler(scheduler.clone())
            .with_config(config);
        Self {
            engine,
            store,
            exporter,
            scheduler,
            dialogue,
        }
    }

    fn user() -> UserIdentity {
        UserIdentity::new(USER, Some("tester".to_string()))
    }

    async fn act(&self, action: Action, message_id: i64, text: Option<&str>) -> Vec<Outbound> {
        let event =
            InboundEvent::new(Self::user(), action).with_source(message_id, text.map(String::from));
        self.engine.handle(event).await
    }

    async fn start(&self) -> Vec<Outbound> {
        self.engine
            .handle(InboundEvent::new(Self::user(), Action::Start))
            .await
    }

    async fn select_branch(&self, key: &str) -> Vec<Outbound> {
        self.act(
            Action::SelectBranch {
                key: key.to_string(),
            },
            1,
            Some(&self.dialogue.greeting),
        )
        .await
    }

    async fn answer(&self, key: &str, question: usize, option: usize) -> Vec<Outbound> {
        let branch = &self.dialogue.branches[self.dialogue.branch_index(key).unwrap()];
        self.act(
            Action::SelectAnswer {
                branch: None,
                question,
                option,
            },
            10 + question as i64,
            Some(&branch.questions[question].text),
        )
        .await
    }

    async fn answer_all(&self, key: &str) -> Vec<Outbound> {
        let count = self.branch(key).questions.len();
        let mut last = Vec::new();
        for question in 0..count {
            last = self.answer(key, question, 0).await;
        }
        last
    }

    fn branch(&self, key: &str) -> &dialogue_core::Branch {
        &self.dialogue.branches[self.dialogue.branch_index(key).unwrap()]
    }

    async fn state(&self) -> Option<dialogue_core::ConversationState> {
        self.store.load(USER).await.unwrap()
    }
}

fn texts(outbound: &[Outbound]) -> Vec<&str> {
    outbound.iter().filter_map(Outbound::text).collect()
}

#[tokio::test]
async fn start_shows_one_button_per_branch() {
    let harness = Harness::new();
    let outbound = harness.start().await;

    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].text(), Some(harness.dialogue.greeting.as_str()));
    let payloads: Vec<_> = outbound[0].keyboard().unwrap().payloads().collect();
    assert_eq!(
        payloads,
        vec!["branch_client", "branch_psychologist", "branch_mixed", "branch_express"]
    );
    assert_eq!(harness.state().await.unwrap().stage, Stage::Menu);
}

#[tokio::test]
async fn branch_selection_edits_menu_into_first_question() {
    let harness = Harness::new();
    harness.start().await;
    let outbound = harness.select_branch("psychologist").await;

    let first = &harness.branch("psychologist").questions[0];
    match &outbound[..] {
        [Outbound::Edit {
            message_id: 1,
            text,
            keyboard: Some(keyboard),
        }] => {
            assert_eq!(text, &first.text);
            let payloads: Vec<_> = keyboard.payloads().collect();
            assert_eq!(payloads, vec!["answer_0_0", "answer_0_1", "answer_0_2"]);
        }
        other => panic!("unexpected outbound: {other:?}"),
    }
    let state = harness.state().await.unwrap();
    assert_eq!(state.stage, Stage::Question(0));
    assert!(state.answers.is_empty());
}

#[tokio::test]
async fn walking_every_branch_reaches_final_with_all_answers() {
    let keys: Vec<String> = Harness::new()
        .dialogue
        .branches
        .iter()
        .map(|branch| branch.key.clone())
        .collect();

    for key in keys {
        let harness = Harness::new();
        harness.start().await;
        harness.select_branch(&key).await;
        let count = harness.branch(&key).questions.len();

        for question in 0..count {
            let option = harness.branch(&key).questions[question].options.len() - 1;
            harness.answer(&key, question, option).await;
            let state = harness.state().await.unwrap();
            assert_eq!(state.answers.len(), question + 1, "branch {key}");
        }

        let state = harness.state().await.unwrap();
        assert_eq!(state.answers.len(), count, "branch {key}");
        assert_eq!(state.stage, Stage::Final, "branch {key}");
    }
}

#[tokio::test]
async fn intermediate_answer_replaces_the_question_message() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("client").await;
    let outbound = harness.answer("client", 0, 1).await;

    assert_eq!(outbound[0], Outbound::ClearKeyboard { message_id: 10 });
    assert_eq!(outbound[1], Outbound::Delete { message_id: 10 });
    let next = &harness.branch("client").questions[1];
    assert_eq!(outbound[2].text(), Some(next.text.as_str()));
    let payloads: Vec<_> = outbound[2].keyboard().unwrap().payloads().collect();
    assert_eq!(payloads, vec!["answer_1_0", "answer_1_1", "answer_1_2"]);

    let state = harness.state().await.unwrap();
    assert_eq!(state.stage, Stage::Question(1));
    assert_eq!(state.answers[0].answer, harness.branch("client").questions[0].options[1]);
}

#[tokio::test]
async fn recovery_from_question_text_matches_the_stateful_path() {
    let stateful = Harness::new();
    stateful.start().await;
    stateful.select_branch("mixed").await;
    let with_state = stateful.answer("mixed", 0, 2).await;

    let stateless = Harness::new();
    let recovered = stateless.answer("mixed", 0, 2).await;

    assert_eq!(with_state, recovered);
    let a = stateful.state().await.unwrap();
    let b = stateless.state().await.unwrap();
    assert_eq!(a.stage, b.stage);
    assert_eq!(a.branch, b.branch);
    assert_eq!(a.answers, b.answers);
}

#[tokio::test]
async fn recovery_mid_branch_continues_after_state_loss() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("client").await;
    harness.answer("client", 0, 0).await;
    harness.store.forget(USER);

    let outbound = harness.answer("client", 1, 2).await;
    let next = &harness.branch("client").questions[2];
    assert_eq!(outbound.last().unwrap().text(), Some(next.text.as_str()));

    let state = harness.state().await.unwrap();
    assert_eq!(state.branch, harness.dialogue.branch_index("client"));
    assert_eq!(state.stage, Stage::Question(2));
    // Only the answer given after the loss survives.
    assert_eq!(state.answers.len(), 1);
}

#[tokio::test]
async fn replayed_answer_is_appended_twice() {
    // Known gap: there is no per-event deduplication key.
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("client").await;
    harness.answer("client", 0, 1).await;
    harness.answer("client", 0, 1).await;

    let state = harness.state().await.unwrap();
    assert_eq!(state.answers.len(), 2);
    assert_eq!(state.answers[0], state.answers[1]);
}

#[tokio::test]
async fn unresolvable_answer_reports_branch_not_found_without_mutation() {
    let harness = Harness::new();
    let outbound = harness
        .act(
            Action::SelectAnswer {
                branch: Some("ghost".to_string()),
                question: 0,
                option: 0,
            },
            5,
            Some("text nobody ever sent"),
        )
        .await;

    assert_eq!(
        texts(&outbound),
        vec![harness.dialogue.messages.branch_not_found.as_str()]
    );
    assert!(harness.store.is_empty());
    assert!(harness.exporter.reports().is_empty());
}

#[tokio::test]
async fn unknown_branch_selection_leaves_state_untouched() {
    let harness = Harness::new();
    harness.start().await;
    let before = harness.state().await;

    let outbound = harness.select_branch_raw("ghost").await;
    assert_eq!(
        texts(&outbound),
        vec![harness.dialogue.messages.branch_not_found.as_str()]
    );
    assert_eq!(harness.state().await, before);
}

impl Harness {
    async fn select_branch_raw(&self, key: &str) -> Vec<Outbound> {
        self.act(
            Action::SelectBranch {
                key: key.to_string(),
            },
            1,
            None,
        )
        .await
    }
}

#[tokio::test]
async fn out_of_range_option_is_rejected_without_mutation() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("client").await;
    let before = harness.state().await;

    let outbound = harness.answer("client", 0, 99).await;
    assert_eq!(
        texts(&outbound),
        vec![harness.dialogue.messages.branch_not_found.as_str()]
    );
    assert_eq!(harness.state().await, before);
}

#[tokio::test]
async fn last_answer_sends_diagnosis_then_final_prompt() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("client").await;
    let outbound = harness.answer_all("client").await;
    let client = harness.branch("client");

    assert_eq!(outbound[0], Outbound::Delete { message_id: 13 });
    assert_eq!(outbound[1], Outbound::send(&client.diagnosis));
    assert_eq!(outbound[2].text(), client.delayed.as_deref());
    let payloads: Vec<_> = outbound[2].keyboard().unwrap().payloads().collect();
    assert_eq!(payloads, vec!["postfinal_client_0", "postfinal_client_1"]);
    assert!(harness.exporter.reports().is_empty());
}

#[tokio::test]
async fn branch_without_final_options_finalizes_immediately() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("express").await;
    let outbound = harness.answer_all("express").await;

    let express = harness.branch("express");
    assert_eq!(
        texts(&outbound),
        vec![
            express.diagnosis.as_str(),
            harness.dialogue.messages.thank_you.as_str()
        ]
    );
    let reports = harness.exporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].answers.len(), express.questions.len());
    assert_eq!(reports[0].branch_label, express.label);
    assert_eq!(reports[0].username.as_deref(), Some("tester"));
}

#[tokio::test]
async fn client_group_request_routes_to_group_menu() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("client").await;
    harness.answer_all("client").await;
    let client = harness.branch("client");

    let outbound = harness
        .act(
            Action::SelectPostFinal {
                branch: Some("client".to_string()),
                option: 0,
            },
            20,
            client.delayed.as_deref(),
        )
        .await;

    match &outbound[..] {
        [Outbound::Edit {
            message_id: 20,
            text,
            keyboard: Some(keyboard),
        }] => {
            assert_eq!(text, &client.group_menu.as_ref().unwrap().text);
            let payloads: Vec<_> = keyboard.payloads().collect();
            assert_eq!(payloads, vec!["group_client_0", "group_client_1", "group_client_2"]);
        }
        other => panic!("unexpected outbound: {other:?}"),
    }
    assert!(harness.exporter.reports().is_empty());
    assert_eq!(
        harness.state().await.unwrap().final_choice.as_deref(),
        Some("Хочу в группу")
    );
}

#[tokio::test]
async fn other_client_choice_finalizes_immediately() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("client").await;
    harness.answer_all("client").await;

    let outbound = harness
        .act(
            Action::SelectPostFinal {
                branch: Some("client".to_string()),
                option: 1,
            },
            20,
            None,
        )
        .await;

    assert_eq!(outbound[0], Outbound::Delete { message_id: 20 });
    assert_eq!(outbound[1].text(), Some(harness.dialogue.messages.thank_you.as_str()));
    let reports = harness.exporter.reports();
    assert_eq!(reports.len(), 1);
    let last = reports[0].answers.last().unwrap();
    assert_eq!(last.question, harness.dialogue.messages.final_choice_label);
    assert_eq!(last.answer, "Задать вопрос");
}

#[tokio::test]
async fn mixed_branch_opens_group_menu_for_first_two_choices_only() {
    for (option, opens_menu) in [(0, true), (1, true), (2, false)] {
        let harness = Harness::new();
        harness.start().await;
        harness.select_branch("mixed").await;
        harness.answer_all("mixed").await;

        let outbound = harness
            .act(
                Action::SelectPostFinal {
                    branch: Some("mixed".to_string()),
                    option,
                },
                30,
                None,
            )
            .await;

        let is_menu = matches!(outbound.as_slice(), [Outbound::Edit { .. }]);
        assert_eq!(is_menu, opens_menu, "option {option}");
        assert_eq!(harness.exporter.reports().len(), usize::from(!opens_menu));
    }
}

#[tokio::test]
async fn full_client_scenario_exports_once_with_choice_rows() {
    let harness = Harness::new();
    let client = harness.branch("client").clone();

    let greeting = harness.start().await;
    assert_eq!(
        greeting[0].keyboard().unwrap().rows.len(),
        harness.dialogue.branches.len()
    );

    let first = harness.select_branch("client").await;
    assert_eq!(first[0].text(), Some(client.questions[0].text.as_str()));

    let after_last = harness.answer_all("client").await;
    assert!(texts(&after_last).contains(&client.diagnosis.as_str()));

    let menu = harness
        .act(
            Action::SelectPostFinal {
                branch: Some("client".to_string()),
                option: 0,
            },
            20,
            client.delayed.as_deref(),
        )
        .await;
    let menu_text = &client.group_menu.as_ref().unwrap().text;
    assert_eq!(menu[0].text(), Some(menu_text.as_str()));

    let done = harness
        .act(
            Action::SelectGroup {
                branch: Some("client".to_string()),
                option: 2,
            },
            20,
            Some(menu_text),
        )
        .await;
    assert_eq!(done[0], Outbound::Delete { message_id: 20 });
    assert_eq!(done[1].text(), Some(harness.dialogue.messages.thank_you.as_str()));

    let reports = harness.exporter.reports();
    assert_eq!(reports.len(), 1);
    let rows = &reports[0].answers;
    assert_eq!(rows.len(), client.questions.len() + 2);
    assert_eq!(rows[rows.len() - 2].answer, "Хочу в группу");
    assert_eq!(rows[rows.len() - 1].answer, "Онлайн-группа");
}

#[tokio::test]
async fn group_selection_falls_back_to_stored_branch() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("mixed").await;
    harness.answer_all("mixed").await;

    let outbound = harness
        .act(
            Action::SelectGroup {
                branch: None,
                option: 1,
            },
            30,
            None,
        )
        .await;

    assert_eq!(outbound[1].text(), Some(harness.dialogue.messages.thank_you.as_str()));
    let reports = harness.exporter.reports();
    assert_eq!(reports[0].answers.last().unwrap().answer, "Балинтовская группа");
}

#[tokio::test]
async fn export_failure_tells_user_results_were_recorded() {
    let harness = Harness::with(RecordingExporter::failing(), EngineConfig::default());
    harness.start().await;
    harness.select_branch("express").await;
    let outbound = harness.answer_all("express").await;

    assert_eq!(
        outbound.last().unwrap().text(),
        Some(harness.dialogue.messages.delivery_failed.as_str())
    );
    // No automatic retry.
    assert_eq!(harness.exporter.reports().len(), 1);
}

#[tokio::test]
async fn follow_up_mode_finalizes_and_schedules_the_prompt() {
    let config = EngineConfig {
        follow_up_delay: Some(Duration::from_secs(7200)),
        ..EngineConfig::default()
    };
    let harness = Harness::with(RecordingExporter::default(), config);
    harness.start().await;
    harness.select_branch("psychologist").await;
    let outbound = harness.answer_all("psychologist").await;
    let psychologist = harness.branch("psychologist");

    assert!(outbound.iter().all(|o| o.keyboard().is_none()));
    assert_eq!(outbound.last().unwrap().text(), Some(harness.dialogue.messages.thank_you.as_str()));
    assert_eq!(harness.exporter.reports().len(), 1);

    let jobs = harness.scheduler.jobs.lock().unwrap().clone();
    assert_eq!(
        jobs,
        vec![FollowUp {
            user_id: USER,
            message: psychologist.delayed.clone().unwrap(),
            options: Some(psychologist.final_options.clone()),
            delay: Duration::from_secs(7200),
        }]
    );
}

#[tokio::test]
async fn follow_up_tap_after_state_loss_resolves_by_delayed_text() {
    let harness = Harness::new();
    let psychologist = harness.branch("psychologist").clone();

    let outbound = harness
        .act(
            Action::SelectPostFinal {
                branch: None,
                option: 1,
            },
            40,
            psychologist.delayed.as_deref(),
        )
        .await;

    assert_eq!(outbound.last().unwrap().text(), Some(harness.dialogue.messages.thank_you.as_str()));
    let reports = harness.exporter.reports();
    assert_eq!(reports[0].branch_label, psychologist.label);
    assert_eq!(reports[0].answers.len(), 1);
    assert_eq!(reports[0].answers[0].answer, "На разбор практики");
}

#[tokio::test]
async fn post_final_without_any_evidence_is_not_found() {
    let harness = Harness::new();
    let outbound = harness
        .act(
            Action::SelectPostFinal {
                branch: None,
                option: 0,
            },
            40,
            Some("unrelated"),
        )
        .await;

    assert_eq!(
        texts(&outbound),
        vec![harness.dialogue.messages.branch_not_found.as_str()]
    );
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn keyed_payloads_are_emitted_when_enabled() {
    let config = EngineConfig {
        embed_branch_in_payload: true,
        ..EngineConfig::default()
    };
    let harness = Harness::with(RecordingExporter::default(), config);
    harness.start().await;
    let outbound = harness.select_branch("express").await;

    let payloads: Vec<_> = outbound[0].keyboard().unwrap().payloads().collect();
    assert_eq!(
        payloads,
        vec!["answer_express_0_0", "answer_express_0_1", "answer_express_0_2"]
    );
}

#[tokio::test]
async fn keyed_answer_resolves_without_state_or_text() {
    let harness = Harness::new();
    let outbound = harness
        .act(
            Action::SelectAnswer {
                branch: Some("express".to_string()),
                question: 0,
                option: 1,
            },
            50,
            None,
        )
        .await;

    let next = &harness.branch("express").questions[1];
    assert_eq!(outbound.last().unwrap().text(), Some(next.text.as_str()));
}

#[tokio::test]
async fn help_and_free_text_get_service_replies() {
    let harness = Harness::new();
    let help = harness
        .engine
        .handle(InboundEvent::new(Harness::user(), Action::Help))
        .await;
    let text = harness
        .engine
        .handle(InboundEvent::new(Harness::user(), Action::Text))
        .await;

    assert_eq!(texts(&help), vec![harness.dialogue.messages.help.as_str()]);
    assert_eq!(texts(&text), vec![harness.dialogue.messages.fallback.as_str()]);
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn start_resets_a_finished_conversation() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("express").await;
    harness.answer_all("express").await;
    assert_eq!(harness.state().await.unwrap().stage, Stage::Final);

    harness.start().await;
    let state = harness.state().await.unwrap();
    assert_eq!(state.stage, Stage::Menu);
    assert!(state.answers.is_empty());
    assert!(state.branch.is_none());
}

async fn finish_with_choice(harness: &Harness, key: &str, option: usize) -> Vec<Outbound> {
    harness
        .act(
            Action::SelectPostFinal {
                branch: Some(key.to_string()),
                option,
            },
            20,
            None,
        )
        .await
}

#[tokio::test]
async fn replayed_post_final_choice_exports_once() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("client").await;
    harness.answer_all("client").await;

    finish_with_choice(&harness, "client", 1).await;
    let replay = finish_with_choice(&harness, "client", 1).await;

    assert_eq!(
        texts(&replay),
        vec![harness.dialogue.messages.already_recorded.as_str()]
    );
    assert_eq!(harness.exporter.reports().len(), 1);
    assert_eq!(
        harness.state().await.unwrap().final_choice.as_deref(),
        Some("Задать вопрос")
    );
}

#[tokio::test]
async fn post_final_choice_during_walk_is_rejected_without_mutation() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("client").await;
    harness.answer("client", 0, 0).await;
    let before = harness.state().await.unwrap();

    let outbound = finish_with_choice(&harness, "client", 1).await;

    assert_eq!(
        texts(&outbound),
        vec![harness.dialogue.messages.branch_not_found.as_str()]
    );
    assert_eq!(harness.state().await.unwrap(), before);
    assert_eq!(before.stage, Stage::Question(1));
    assert!(harness.exporter.reports().is_empty());
}

#[tokio::test]
async fn group_choice_during_walk_is_rejected_without_mutation() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("mixed").await;
    harness.answer("mixed", 0, 0).await;
    let before = harness.state().await.unwrap();

    let outbound = harness
        .act(
            Action::SelectGroup {
                branch: Some("mixed".to_string()),
                option: 0,
            },
            30,
            None,
        )
        .await;

    assert_eq!(
        texts(&outbound),
        vec![harness.dialogue.messages.branch_not_found.as_str()]
    );
    assert_eq!(harness.state().await.unwrap(), before);
    assert!(harness.exporter.reports().is_empty());
}

#[tokio::test]
async fn replayed_group_choice_exports_once() {
    let harness = Harness::new();
    harness.start().await;
    harness.select_branch("mixed").await;
    harness.answer_all("mixed").await;
    finish_with_choice(&harness, "mixed", 0).await;

    let group = Action::SelectGroup {
        branch: Some("mixed".to_string()),
        option: 1,
    };
    let first = harness.act(group.clone(), 20, None).await;
    let replay = harness.act(group, 20, None).await;

    assert_eq!(first.last().unwrap().text(), Some(harness.dialogue.messages.thank_you.as_str()));
    assert_eq!(
        texts(&replay),
        vec![harness.dialogue.messages.already_recorded.as_str()]
    );
    let reports = harness.exporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].answers.last().unwrap().answer, "Балинтовская группа");
}

#[tokio::test]
async fn follow_up_choice_exports_again_only_once() {
    let config = EngineConfig {
        follow_up_delay: Some(Duration::from_secs(7200)),
        ..EngineConfig::default()
    };
    let harness = Harness::with(RecordingExporter::default(), config);
    harness.start().await;
    harness.select_branch("psychologist").await;
    harness.answer_all("psychologist").await;
    let delayed = harness.branch("psychologist").delayed.clone();

    let nudge_tap = Action::SelectPostFinal {
        branch: None,
        option: 1,
    };
    harness.act(nudge_tap.clone(), 40, delayed.as_deref()).await;
    let replay = harness.act(nudge_tap, 40, delayed.as_deref()).await;

    let reports = harness.exporter.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].answers.last().unwrap().answer, "На разбор практики");
    assert_eq!(
        texts(&replay),
        vec![harness.dialogue.messages.already_recorded.as_str()]
    );
}

/// Store that yields between reading and returning, so unserialized
/// read-modify-write cycles would overlap.
#[derive(Default)]
struct SlowStore {
    inner: InMemoryConversationStore,
}

#[async_trait]
impl ConversationStore for SlowStore {
    async fn load(&self, user_id: i64) -> dialogue_core::Result<Option<ConversationState>> {
        let state = self.inner.load(user_id).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        state
    }

    async fn save(&self, user_id: i64, state: ConversationState) -> dialogue_core::Result<()> {
        self.inner.save(user_id, state).await
    }
}

#[tokio::test]
async fn concurrent_events_of_one_user_do_not_interleave() {
    let dialogue = Arc::new(Dialogue::builtin().unwrap());
    let store = Arc::new(SlowStore::default());
    let engine = DialogueEngine::new(
        dialogue.clone(),
        store.clone(),
        Arc::new(RecordingExporter::default()),
    );
    let express = &dialogue.branches[dialogue.branch_index("express").unwrap()];

    engine
        .handle(InboundEvent::new(
            Harness::user(),
            Action::SelectBranch {
                key: "express".to_string(),
            },
        ))
        .await;

    let answer = || {
        InboundEvent::new(
            Harness::user(),
            Action::SelectAnswer {
                branch: None,
                question: 0,
                option: 0,
            },
        )
        .with_source(10, Some(express.questions[0].text.clone()))
    };
    tokio::join!(engine.handle(answer()), engine.handle(answer()));

    let state = store.load(USER).await.unwrap().unwrap();
    // Both writes survive; neither overwrote the other.
    assert_eq!(state.answers.len(), 2);
    assert_eq!(state.stage, Stage::Question(1));
}

#[tokio::test]
async fn follow_up_delay_without_scheduler_keeps_prompt_inline() {
    let dialogue = Arc::new(Dialogue::builtin().unwrap());
    let exporter = Arc::new(RecordingExporter::default());
    let engine = DialogueEngine::new(
        dialogue.clone(),
        Arc::new(InMemoryConversationStore::new()),
        exporter.clone(),
    )
    .with_config(EngineConfig {
        follow_up_delay: Some(Duration::from_secs(7200)),
        ..EngineConfig::default()
    });
    let psychologist = &dialogue.branches[dialogue.branch_index("psychologist").unwrap()];

    engine
        .handle(InboundEvent::new(
            Harness::user(),
            Action::SelectBranch {
                key: "psychologist".to_string(),
            },
        ))
        .await;
    let mut last = Vec::new();
    for (question, asked) in psychologist.questions.iter().enumerate() {
        last = engine
            .handle(
                InboundEvent::new(
                    Harness::user(),
                    Action::SelectAnswer {
                        branch: None,
                        question,
                        option: 0,
                    },
                )
                .with_source(10 + question as i64, Some(asked.text.clone())),
            )
            .await;
    }

    let prompt = last.last().unwrap();
    assert_eq!(prompt.text(), psychologist.delayed.as_deref());
    assert!(prompt.keyboard().is_some());
    assert!(exporter.reports().is_empty());
}
