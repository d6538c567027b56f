//! Inbound events - what the engine is asked to react to

use crate::payload::CallbackPayload;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: i64,
    pub username: Option<String>,
}

impl UserIdentity {
    pub fn new(id: i64, username: Option<String>) -> Self {
        Self { id, username }
    }
}

/// The message a tapped button was attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    pub message_id: i64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Help,
    /// Any other text the user typed.
    Text,
    SelectBranch {
        key: String,
    },
    SelectAnswer {
        branch: Option<String>,
        question: usize,
        option: usize,
    },
    SelectPostFinal {
        branch: Option<String>,
        option: usize,
    },
    SelectGroup {
        branch: Option<String>,
        option: usize,
    },
}

impl From<CallbackPayload> for Action {
    fn from(payload: CallbackPayload) -> Self {
        let hint = payload.branch_hint().map(str::to_string);
        match payload {
            CallbackPayload::Branch { key } => Self::SelectBranch { key },
            CallbackPayload::Answer {
                question, option, ..
            } => Self::SelectAnswer {
                branch: hint,
                question,
                option,
            },
            CallbackPayload::PostFinal { option, .. } => Self::SelectPostFinal {
                branch: hint,
                option,
            },
            CallbackPayload::Group { option, .. } => Self::SelectGroup {
                branch: hint,
                option,
            },
        }
    }
}

/// A single context-free event, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user: UserIdentity,
    pub source: Option<SourceMessage>,
    pub action: Action,
}

impl InboundEvent {
    pub fn new(user: UserIdentity, action: Action) -> Self {
        Self {
            user,
            source: None,
            action,
        }
    }

    pub fn with_source(mut self, message_id: i64, text: Option<String>) -> Self {
        self.source = Some(SourceMessage { message_id, text });
        self
    }

    pub(crate) fn source_text(&self) -> Option<&str> {
        self.source.as_ref().and_then(|source| source.text.as_deref())
    }

    pub(crate) fn source_id(&self) -> Option<i64> {
        self.source.as_ref().map(|source| source.message_id)
    }
}
