use async_trait::async_trait;
use tokio::sync::Mutex;

use super::JobQueue;
use crate::error::Result;

/// Process-local queue. Lost on restart; meant for tests and single-instance
/// runs without a Redis endpoint.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    // (score, member), kept sorted
    entries: Mutex<Vec<(i64, String)>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn add(&self, score: i64, member: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        // sorted-set semantics: re-adding a member updates its score
        entries.retain(|(_, existing)| existing != member);
        let position = entries
            .iter()
            .position(|(existing, m)| (*existing, m.as_str()) > (score, member))
            .unwrap_or(entries.len());
        entries.insert(position, (score, member.to_string()));
        Ok(())
    }

    async fn due(&self, max_score: i64, limit: usize) -> Result<Vec<String>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|(score, _)| (0..=max_score).contains(score))
            .take(limit)
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn remove(&self, member: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .retain(|(_, existing)| existing != member);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn due_returns_members_in_score_order_up_to_limit() {
        let queue = InMemoryQueue::new();
        queue.add(30, "c").await.unwrap();
        queue.add(10, "a").await.unwrap();
        queue.add(20, "b").await.unwrap();
        queue.add(99, "late").await.unwrap();

        assert_eq!(queue.due(50, 10).await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(queue.due(50, 2).await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn re_adding_a_member_moves_it() {
        let queue = InMemoryQueue::new();
        queue.add(10, "a").await.unwrap();
        queue.add(100, "a").await.unwrap();
        assert_eq!(queue.len().await, 1);
        assert!(queue.due(50, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let queue = InMemoryQueue::new();
        queue.add(1, "a").await.unwrap();
        queue.remove("a").await.unwrap();
        queue.remove("a").await.unwrap();
        assert!(queue.is_empty().await);
    }
}
