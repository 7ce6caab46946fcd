//! Per-user cache of the last resolved intent and parameters.

use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use pq_protocol::{Intent, Parameters, Task};

use crate::followup::PriorTurn;

/// Entries older than this are treated as absent.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// What the last turn of one user resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub intent: Intent,
    pub parameters: Parameters,
    pub question: String,
    pub task: Option<Task>,
    pub resolved_at: DateTime<Utc>,
}

impl ContextEntry {
    pub fn to_prior(&self) -> PriorTurn {
        PriorTurn {
            intent: self.intent,
            parameters: self.parameters.clone(),
            question: self.question.clone(),
            task: self.task,
        }
    }
}

/// Time-bounded per-user context.
///
/// Cloning shares the underlying cache. Writes for one user are visible to
/// that user's next read.
#[derive(Clone)]
pub struct QuickContext {
    cache: Cache<String, ContextEntry>,
    ttl: Duration,
}

impl QuickContext {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, user_id: &str) -> Option<ContextEntry> {
        self.get_at(user_id, Utc::now())
    }

    /// Entry for `user_id` if it was resolved no longer than the TTL before
    /// `now`.
    pub fn get_at(&self, user_id: &str, now: DateTime<Utc>) -> Option<ContextEntry> {
        let entry = self.cache.get(user_id)?;
        match (now - entry.resolved_at).to_std() {
            Ok(age) if age > self.ttl => {
                self.cache.invalidate(user_id);
                None
            }
            _ => Some(entry),
        }
    }

    pub fn put(&self, user_id: &str, entry: ContextEntry) {
        self.cache.insert(user_id.to_string(), entry);
    }

    pub fn invalidate(&self, user_id: &str) {
        self.cache.invalidate(user_id);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for QuickContext {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for QuickContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuickContext")
            .field("ttl", &self.ttl)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn entry(at: DateTime<Utc>) -> ContextEntry {
        ContextEntry {
            intent: Intent::PeriodSummary,
            parameters: Parameters::default().with_month(2).unwrap(),
            question: "monthly summary for february".into(),
            task: Some(Task::StructuredQuery),
            resolved_at: at,
        }
    }

    #[test]
    fn fresh_entry_is_returned() {
        let ctx = QuickContext::default();
        let now = Utc::now();
        ctx.put("u1", entry(now));
        let got = ctx.get_at("u1", now + TimeDelta::minutes(5)).unwrap();
        assert_eq!(got.intent, Intent::PeriodSummary);
        assert_eq!(got.to_prior().parameters.month.unwrap().number(), 2);
    }

    #[test]
    fn stale_entry_is_absent() {
        let ctx = QuickContext::new(Duration::from_secs(60), 100);
        let now = Utc::now();
        ctx.put("u1", entry(now));
        assert!(ctx.get_at("u1", now + TimeDelta::seconds(61)).is_none());
        // Expired entries are dropped on read.
        assert!(ctx.get_at("u1", now).is_none());
    }

    #[test]
    fn users_are_isolated() {
        let ctx = QuickContext::default();
        ctx.put("u1", entry(Utc::now()));
        assert!(ctx.get("u2").is_none());
        ctx.invalidate("u1");
        assert!(ctx.get("u1").is_none());
    }

    #[test]
    fn latest_write_wins() {
        let ctx = QuickContext::default();
        let now = Utc::now();
        ctx.put("u1", entry(now));
        let mut newer = entry(now);
        newer.intent = Intent::Ranking;
        ctx.put("u1", newer);
        assert_eq!(ctx.get("u1").unwrap().intent, Intent::Ranking);
    }
}
