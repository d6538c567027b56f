//! dialogue_core - Branching questionnaire engine
//!
//! Holds the dialogue definition, the per-user conversation state, the
//! callback payload codec and the engine that turns inbound user actions into
//! outbound prompts. Transport, scheduling and export live in other crates and
//! plug in through the traits in [`ports`] and [`store`].

pub mod dialogue;
pub mod engine;
pub mod error;
pub mod payload;
pub mod ports;
pub mod state;
pub mod store;

pub use dialogue::{Branch, Dialogue, GroupMenu, Messages, Question};
pub use engine::{
    Action, Button, DialogueEngine, EngineConfig, InboundEvent, Keyboard, Outbound, SourceMessage,
    UserIdentity,
};
pub use error::{DialogueError, Result};
pub use payload::CallbackPayload;
pub use ports::{FollowUp, FollowUpScheduler, ResultExporter, SurveyReport};
pub use state::{AnswerRecord, ConversationState, Stage};
pub use store::{ConversationStore, InMemoryConversationStore};
