//! Callback payload codec
//!
//! Button payloads are the only data that reliably travels with a tap, so
//! their format is fixed:
//!
//! - `branch_<branchKey>`
//! - `answer_<questionIndex>_<optionIndex>` (or `answer_<branchKey>_<q>_<o>`)
//! - `postfinal_<branchKey>_<optionIndex>`
//! - `group_<branchKey>_<groupOptionIndex>`
//!
//! Branch keys may contain underscores, so the key capture is greedy up to the
//! trailing numeric suffixes.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Bot API limit for `callback_data`.
pub const MAX_PAYLOAD_LEN: usize = 64;

static BRANCH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^branch_(.+)$").unwrap());
static ANSWER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^answer_(?:(.+)_)?(\d+)_(\d+)$").unwrap());
// The key may be empty: delayed follow-ups do not know their branch.
static POSTFINAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^postfinal_(.*)_(\d+)$").unwrap());
static GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^group_(.+)_(\d+)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackPayload {
    Branch {
        key: String,
    },
    Answer {
        branch: Option<String>,
        question: usize,
        option: usize,
    },
    PostFinal {
        branch: String,
        option: usize,
    },
    Group {
        branch: String,
        option: usize,
    },
}

impl CallbackPayload {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(caps) = ANSWER_RE.captures(data) {
            return Some(Self::Answer {
                branch: caps.get(1).map(|m| m.as_str().to_string()),
                question: caps[2].parse().ok()?,
                option: caps[3].parse().ok()?,
            });
        }
        if let Some(caps) = POSTFINAL_RE.captures(data) {
            return Some(Self::PostFinal {
                branch: caps[1].to_string(),
                option: caps[2].parse().ok()?,
            });
        }
        if let Some(caps) = GROUP_RE.captures(data) {
            return Some(Self::Group {
                branch: caps[1].to_string(),
                option: caps[2].parse().ok()?,
            });
        }
        BRANCH_RE.captures(data).map(|caps| Self::Branch {
            key: caps[1].to_string(),
        })
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Branch key carried by the payload, if any. Empty keys count as absent.
    pub fn branch_hint(&self) -> Option<&str> {
        let key = match self {
            Self::Branch { key } => Some(key.as_str()),
            Self::Answer { branch, .. } => branch.as_deref(),
            Self::PostFinal { branch, .. } | Self::Group { branch, .. } => Some(branch.as_str()),
        };
        key.filter(|key| !key.is_empty())
    }
}

impl fmt::Display for CallbackPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch { key } => write!(f, "branch_{}", key),
            Self::Answer {
                branch: Some(key),
                question,
                option,
            } => write!(f, "answer_{}_{}_{}", key, question, option),
            Self::Answer {
                branch: None,
                question,
                option,
            } => write!(f, "answer_{}_{}", question, option),
            Self::PostFinal { branch, option } => write!(f, "postfinal_{}_{}", branch, option),
            Self::Group { branch, option } => write!(f, "group_{}_{}", branch, option),
        }
    }
}
