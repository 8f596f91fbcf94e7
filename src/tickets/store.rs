use super::{Ticket, TicketError};
use crate::shared::models::{SupportLine, TicketStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Counters for one support line's queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStats {
    /// New plus in-progress tickets waiting on the line.
    pub pending: u64,
    pub in_progress: u64,
    /// Resolved and closed tickets the line has handled.
    pub resolved: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub lines: BTreeMap<SupportLine, LineStats>,
}

impl QueueStats {
    pub fn line(&self, line: SupportLine) -> LineStats {
        self.lines.get(&line).copied().unwrap_or_default()
    }
}

/// Persistence seam for tickets. Updates use optimistic locking: the write
/// succeeds only when the caller's version matches the stored one, and the
/// store bumps the version on commit.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a draft, assigning its id and display number.
    async fn create(&self, draft: Ticket) -> Result<Ticket, TicketError>;

    async fn get(&self, id: u64) -> Result<Option<Ticket>, TicketError>;

    /// Commit a mutated ticket, returning the stored copy with the bumped
    /// version. Fails with `ConcurrentModification` on a version mismatch.
    async fn update(&self, ticket: &Ticket) -> Result<Ticket, TicketError>;

    /// Tickets on a line, optionally narrowed to one status, ordered by
    /// priority descending then age ascending.
    async fn list_by_line(
        &self,
        line: SupportLine,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, TicketError>;

    /// A requester's tickets, newest first.
    async fn list_by_user(&self, requester_id: i64) -> Result<Vec<Ticket>, TicketError>;

    async fn queue_stats(&self) -> Result<QueueStats, TicketError>;
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    tickets: HashMap<u64, Ticket>,
}

/// In-memory store used in tests and single-process deployments.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                tickets: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn create(&self, draft: Ticket) -> Result<Ticket, TicketError> {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let mut ticket = draft;
        ticket.id = id;
        ticket.number = format!("#{id:03}");
        ticket.version = 1;
        inner.tickets.insert(id, ticket.clone());
        Ok(ticket)
    }

    async fn get(&self, id: u64) -> Result<Option<Ticket>, TicketError> {
        Ok(self.inner.read().await.tickets.get(&id).cloned())
    }

    async fn update(&self, ticket: &Ticket) -> Result<Ticket, TicketError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .tickets
            .get_mut(&ticket.id)
            .ok_or(TicketError::NotFound(ticket.id))?;
        if stored.version != ticket.version {
            return Err(TicketError::ConcurrentModification(ticket.id));
        }
        *stored = ticket.clone();
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn list_by_line(
        &self,
        line: SupportLine,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, TicketError> {
        let inner = self.inner.read().await;
        let mut tickets: Vec<Ticket> = inner
            .tickets
            .values()
            .filter(|t| t.line == line && status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (Reverse(t.classification.priority), t.created_at, t.id));
        Ok(tickets)
    }

    async fn list_by_user(&self, requester_id: i64) -> Result<Vec<Ticket>, TicketError> {
        let inner = self.inner.read().await;
        let mut tickets: Vec<Ticket> = inner
            .tickets
            .values()
            .filter(|t| t.requester_id == requester_id)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (Reverse(t.created_at), Reverse(t.id)));
        Ok(tickets)
    }

    async fn queue_stats(&self) -> Result<QueueStats, TicketError> {
        let inner = self.inner.read().await;
        let mut stats = QueueStats::default();
        for line in SupportLine::ALL {
            stats.lines.insert(line, LineStats::default());
        }
        for ticket in inner.tickets.values() {
            let entry = stats.lines.entry(ticket.line).or_default();
            match ticket.status {
                TicketStatus::New | TicketStatus::InProgress => {
                    entry.pending += 1;
                    if ticket.status == TicketStatus::InProgress {
                        entry.in_progress += 1;
                    }
                }
                TicketStatus::Resolved | TicketStatus::Closed => entry.resolved += 1,
                TicketStatus::WaitingForUser | TicketStatus::Escalated => {}
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{
        ChatTurn, Classification, Priority, RequestKind, TargetSystem, Theme,
    };
    use chrono::{Duration, Utc};

    fn draft(priority: Priority, line: SupportLine) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: 0,
            number: String::new(),
            requester_id: 7,
            requester_name: "maria".to_string(),
            title: "printer jams on every job".to_string(),
            description: "printer jams on every job".to_string(),
            classification: Classification {
                theme: Theme::Hardware,
                kind: RequestKind::Incident,
                priority,
                target_system: Some(TargetSystem::Printer),
                reasoning: "hardware fault".to_string(),
            },
            line,
            status: TicketStatus::New,
            created_at: now,
            updated_at: now,
            rag_answer: None,
            history: vec![ChatTurn::user("printer jams on every job")],
            resolved: false,
            resolution: None,
            resolved_at: None,
            tags: Vec::new(),
            assignee: None,
            escalation_reason: None,
            user_satisfaction: None,
            version: 0,
        }
    }

    #[tokio::test]
    async fn ids_and_numbers_are_sequential() {
        let store = MemoryStore::new();
        let first = store.create(draft(Priority::Low, SupportLine::L1)).await.unwrap();
        let second = store.create(draft(Priority::Low, SupportLine::L1)).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.number, "#001");
        assert_eq!(second.id, 2);
        assert_eq!(second.number, "#002");
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let ticket = store.create(draft(Priority::Low, SupportLine::L1)).await.unwrap();

        let mut first_writer = ticket.clone();
        first_writer.status = TicketStatus::InProgress;
        store.update(&first_writer).await.unwrap();

        // Second writer still holds the pre-update version.
        let mut second_writer = ticket;
        second_writer.assignee = Some("olga".to_string());
        let err = store.update(&second_writer).await.unwrap_err();
        assert!(matches!(err, TicketError::ConcurrentModification(_)));

        let stored = store.get(first_writer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::InProgress);
        assert_eq!(stored.assignee, None);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn queue_orders_by_priority_then_age() {
        let store = MemoryStore::new();
        let mut old_low = draft(Priority::Low, SupportLine::L1);
        old_low.created_at = Utc::now() - Duration::hours(4);
        let mut old_medium = draft(Priority::Medium, SupportLine::L1);
        old_medium.created_at = Utc::now() - Duration::hours(2);
        let fresh_critical = draft(Priority::Critical, SupportLine::L1);

        let old_low = store.create(old_low).await.unwrap();
        let old_medium = store.create(old_medium).await.unwrap();
        let fresh_critical = store.create(fresh_critical).await.unwrap();

        let queue = store.list_by_line(SupportLine::L1, None).await.unwrap();
        let ids: Vec<u64> = queue.iter().map(|t| t.id).collect();
        // The newest ticket jumps the queue on priority alone.
        assert_eq!(ids, vec![fresh_critical.id, old_medium.id, old_low.id]);
    }

    #[tokio::test]
    async fn queue_filters_by_status() {
        let store = MemoryStore::new();
        let ticket = store.create(draft(Priority::Low, SupportLine::L2)).await.unwrap();
        store.create(draft(Priority::Low, SupportLine::L2)).await.unwrap();

        let mut in_progress = ticket.clone();
        in_progress.status = TicketStatus::InProgress;
        store.update(&in_progress).await.unwrap();

        let only_new = store
            .list_by_line(SupportLine::L2, Some(TicketStatus::New))
            .await
            .unwrap();
        assert_eq!(only_new.len(), 1);
        assert!(only_new.iter().all(|t| t.status == TicketStatus::New));
    }

    #[tokio::test]
    async fn user_listing_is_newest_first() {
        let store = MemoryStore::new();
        let mut older = draft(Priority::Low, SupportLine::L1);
        older.created_at = Utc::now() - Duration::days(1);
        let older = store.create(older).await.unwrap();
        let newer = store.create(draft(Priority::Low, SupportLine::L1)).await.unwrap();

        let mut other_user = draft(Priority::Low, SupportLine::L1);
        other_user.requester_id = 99;
        store.create(other_user).await.unwrap();

        let tickets = store.list_by_user(7).await.unwrap();
        let ids: Vec<u64> = tickets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn stats_count_per_line() {
        let store = MemoryStore::new();
        store.create(draft(Priority::Low, SupportLine::L1)).await.unwrap();
        let worked = store.create(draft(Priority::Low, SupportLine::L1)).await.unwrap();
        let done = store.create(draft(Priority::High, SupportLine::L2)).await.unwrap();

        let mut worked = worked;
        worked.status = TicketStatus::InProgress;
        store.update(&worked).await.unwrap();

        let mut done = done;
        done.status = TicketStatus::Resolved;
        store.update(&done).await.unwrap();

        let stats = store.queue_stats().await.unwrap();
        assert_eq!(stats.line(SupportLine::L1).pending, 2);
        assert_eq!(stats.line(SupportLine::L1).in_progress, 1);
        assert_eq!(stats.line(SupportLine::L2).pending, 0);
        assert_eq!(stats.line(SupportLine::L2).resolved, 1);
        assert_eq!(stats.line(SupportLine::L3), LineStats::default());
    }
}
