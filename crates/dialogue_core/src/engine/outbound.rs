//! Outbound effects - what the transport should do for the user

use crate::payload::CallbackPayload;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub payload: String,
}

/// Inline keyboard, one button per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn single_column<I, T>(buttons: I) -> Self
    where
        I: IntoIterator<Item = (T, CallbackPayload)>,
        T: Into<String>,
    {
        Self {
            rows: buttons
                .into_iter()
                .map(|(text, payload)| {
                    vec![Button {
                        text: text.into(),
                        payload: payload.encode(),
                    }]
                })
                .collect(),
        }
    }

    /// Buttons for a delayed follow-up. The job does not carry a branch key,
    /// so the payload leaves it empty and the branch is recovered from the
    /// message text when tapped.
    pub fn follow_up(options: &[String]) -> Self {
        Self::single_column(options.iter().enumerate().map(|(option, text)| {
            (
                text.clone(),
                CallbackPayload::PostFinal {
                    branch: String::new(),
                    option,
                },
            )
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|button| button.payload.as_str())
    }
}

/// One transport call. Message ids refer to the chat the event came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send {
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        message_id: i64,
        text: String,
        keyboard: Option<Keyboard>,
    },
    ClearKeyboard {
        message_id: i64,
    },
    Delete {
        message_id: i64,
    },
}

impl Outbound {
    pub fn send(text: impl Into<String>) -> Self {
        Self::Send {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn send_with(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Send {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    /// Text of a send or edit.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Send { text, .. } | Self::Edit { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Self::Send { keyboard, .. } | Self::Edit { keyboard, .. } => keyboard.as_ref(),
            _ => None,
        }
    }
}
