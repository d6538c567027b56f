use serde::{Deserialize, Serialize};

/// A message to deliver at `due_at` (epoch milliseconds).
///
/// The serialized form is also the queue member, so it must stay stable:
/// removal matches members byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayedJob {
    pub user_id: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub due_at: i64,
}

impl DelayedJob {
    pub fn request(&self) -> DispatchRequest {
        DispatchRequest {
            user_id: Some(self.user_id),
            message: Some(self.message.clone()),
            options: self.options.clone(),
        }
    }
}

/// Body of a push-scheduled call to `/dispatch-delayed`.
///
/// Fields are optional so the endpoint can answer 400 instead of failing
/// deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}
