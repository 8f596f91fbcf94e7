pub mod store;

use crate::shared::models::{
    ChatTurn, Classification, FeedbackOutcome, SupportLine, TicketStatus,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::{QueueStats, TicketStore};

pub const TITLE_MAX_CHARS: usize = 100;

/// Bounded number of refresh-and-retry attempts after losing a write race.
const CAS_RETRIES: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("ticket {0} not found")]
    NotFound(u64),
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: TicketStatus,
        to: TicketStatus,
    },
    #[error("escalation must move upward: {from} -> {to}")]
    EscalationNotUpward { from: SupportLine, to: SupportLine },
    #[error("resolution text is required to resolve a ticket")]
    MissingResolution,
    #[error("ticket {0} was modified concurrently")]
    ConcurrentModification(u64),
    #[error("storage unavailable: {0}")]
    Storage(String),
}

/// A support request in the hands of the escalation state machine. Never
/// deleted, only transitioned to Closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    /// Display number shown to users and operators, e.g. "#042".
    pub number: String,
    pub requester_id: i64,
    pub requester_name: String,
    pub title: String,
    pub description: String,
    pub classification: Classification,
    pub line: SupportLine,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub rag_answer: Option<String>,
    pub history: Vec<ChatTurn>,
    pub resolved: bool,
    pub resolution: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub escalation_reason: Option<String>,
    pub user_satisfaction: Option<FeedbackOutcome>,
    /// Optimistic-lock counter; bumped by the store on every committed write.
    pub version: u64,
}

impl Ticket {
    /// User-facing confirmation once a ticket has been filed.
    pub fn notice(&self) -> String {
        let mut notice = format!(
            "Ticket filed.\n\n\
             Number: {}\n\
             Theme: {}\n\
             Kind: {}\n\
             Priority: {}\n\
             Assigned to: {}",
            self.number,
            self.classification.theme,
            self.classification.kind,
            self.classification.priority,
            self.line
        );
        if let Some(system) = self.classification.target_system {
            notice.push_str(&format!("\nSystem/Service: {system}"));
        }
        let mut description = self.description.chars().take(200).collect::<String>();
        if self.description.chars().count() > 200 {
            description.push_str("...");
        }
        notice.push_str(&format!(
            "\nDescription: {}\nCreated: {}\n\n\
             Your request has been passed to the specialists. You will be \
             notified when its status changes.",
            description,
            self.created_at.format("%d.%m.%Y %H:%M")
        ));
        notice
    }
}

/// The full state graph in one place, so the legality of every move is
/// declared once and exhaustively testable. Escalated is a side transition
/// out of New/InProgress; Closed is terminal; Resolved -> InProgress is the
/// explicit reopen path.
const ALLOWED_TRANSITIONS: &[(TicketStatus, TicketStatus)] = &[
    (TicketStatus::New, TicketStatus::InProgress),
    (TicketStatus::New, TicketStatus::Escalated),
    (TicketStatus::InProgress, TicketStatus::WaitingForUser),
    (TicketStatus::InProgress, TicketStatus::Resolved),
    (TicketStatus::InProgress, TicketStatus::Escalated),
    (TicketStatus::WaitingForUser, TicketStatus::InProgress),
    (TicketStatus::WaitingForUser, TicketStatus::Resolved),
    (TicketStatus::Resolved, TicketStatus::Closed),
    (TicketStatus::Resolved, TicketStatus::InProgress),
    (TicketStatus::Escalated, TicketStatus::New),
];

pub fn transition_allowed(from: TicketStatus, to: TicketStatus) -> bool {
    ALLOWED_TRANSITIONS.contains(&(from, to))
}

/// Request payload for ticket creation; ids, number, title and timestamps
/// are assigned by the engine and store.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub requester_id: i64,
    pub requester_name: String,
    pub description: String,
    pub classification: Classification,
    pub line: SupportLine,
    pub rag_answer: Option<String>,
    pub history: Vec<ChatTurn>,
}

/// Ticket lifecycle owner: creation, validated status transitions, upward
/// escalation and queue views. All mutations are atomic per ticket; lost
/// write races are retried against refreshed state.
pub struct EscalationEngine {
    store: Arc<dyn TicketStore>,
}

impl EscalationEngine {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    pub async fn create_ticket(&self, new: NewTicket) -> Result<Ticket, TicketError> {
        let now = Utc::now();
        let title: String = new.description.chars().take(TITLE_MAX_CHARS).collect();

        let draft = Ticket {
            id: 0,
            number: String::new(),
            requester_id: new.requester_id,
            requester_name: new.requester_name,
            title,
            description: new.description,
            classification: new.classification,
            line: new.line,
            status: TicketStatus::New,
            created_at: now,
            updated_at: now,
            rag_answer: new.rag_answer,
            history: new.history,
            resolved: false,
            resolution: None,
            resolved_at: None,
            tags: Vec::new(),
            assignee: None,
            escalation_reason: None,
            user_satisfaction: None,
            version: 0,
        };

        let ticket = self.store.create(draft).await?;
        info!(
            "created ticket {} on {} with priority {}",
            ticket.number, ticket.line, ticket.classification.priority
        );
        Ok(ticket)
    }

    pub async fn get_ticket(&self, id: u64) -> Result<Ticket, TicketError> {
        self.store.get(id).await?.ok_or(TicketError::NotFound(id))
    }

    /// Move a ticket through the state graph. Invalid transitions fail with
    /// `InvalidTransition` and leave the ticket untouched. Resolving
    /// requires resolution text; reopening clears the resolved mark.
    pub async fn update_status(
        &self,
        id: u64,
        new_status: TicketStatus,
        resolution: Option<&str>,
    ) -> Result<Ticket, TicketError> {
        self.with_retries(id, |mut ticket| {
            if !transition_allowed(ticket.status, new_status) {
                return Err(TicketError::InvalidTransition {
                    from: ticket.status,
                    to: new_status,
                });
            }

            match new_status {
                TicketStatus::Resolved => {
                    let text = resolution
                        .filter(|r| !r.trim().is_empty())
                        .ok_or(TicketError::MissingResolution)?;
                    ticket.resolved = true;
                    ticket.resolution = Some(text.to_string());
                    ticket.resolved_at = Some(Utc::now());
                }
                TicketStatus::InProgress if ticket.status == TicketStatus::Resolved => {
                    // Explicit reopen: the resolved mark must not survive,
                    // the resolution text stays as history.
                    ticket.resolved = false;
                    ticket.resolved_at = None;
                }
                _ => {}
            }

            let from = ticket.status;
            ticket.status = new_status;
            ticket.updated_at = Utc::now();
            info!("ticket {} status {} -> {}", ticket.number, from, new_status);
            Ok(ticket)
        })
        .await
    }

    /// Transfer a ticket to a higher support line. Escalation is strictly
    /// upward within an episode; the prior line is kept as an audit tag and
    /// the ticket re-enters the target line's queue as New.
    pub async fn escalate(
        &self,
        id: u64,
        new_line: SupportLine,
        reason: &str,
    ) -> Result<Ticket, TicketError> {
        let reason = reason.to_string();
        self.with_retries(id, move |mut ticket| {
            if new_line <= ticket.line {
                return Err(TicketError::EscalationNotUpward {
                    from: ticket.line,
                    to: new_line,
                });
            }
            if !transition_allowed(ticket.status, TicketStatus::Escalated) {
                return Err(TicketError::InvalidTransition {
                    from: ticket.status,
                    to: TicketStatus::Escalated,
                });
            }

            let old_line = ticket.line;
            ticket.tags.push(format!("from-line-{}", old_line.number()));
            ticket.escalation_reason = Some(reason.clone());
            ticket.line = new_line;
            // Escalated is transient: the ticket lands as New in the target
            // line's queue within the same write.
            ticket.status = TicketStatus::New;
            ticket.updated_at = Utc::now();
            info!(
                "escalated ticket {} from {} to {}: {}",
                ticket.number, old_line, new_line, reason
            );
            Ok(ticket)
        })
        .await
    }

    /// Operator queue for a line, highest priority first, oldest first
    /// within the same priority.
    pub async fn get_queue(
        &self,
        line: SupportLine,
        status: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, TicketError> {
        self.store.list_by_line(line, status).await
    }

    pub async fn get_queue_stats(&self) -> Result<QueueStats, TicketError> {
        self.store.queue_stats().await
    }

    pub async fn get_user_tickets(&self, requester_id: i64) -> Result<Vec<Ticket>, TicketError> {
        self.store.list_by_user(requester_id).await
    }

    pub async fn record_user_satisfaction(
        &self,
        id: u64,
        outcome: FeedbackOutcome,
    ) -> Result<Ticket, TicketError> {
        self.with_retries(id, move |mut ticket| {
            ticket.user_satisfaction = Some(outcome);
            ticket.updated_at = Utc::now();
            Ok(ticket)
        })
        .await
    }

    /// Load-mutate-commit with optimistic locking. On a lost race the
    /// mutation is re-applied to the refreshed ticket, never blindly
    /// overwritten.
    async fn with_retries<F>(&self, id: u64, mutate: F) -> Result<Ticket, TicketError>
    where
        F: Fn(Ticket) -> Result<Ticket, TicketError>,
    {
        for attempt in 0..CAS_RETRIES {
            let current = self.get_ticket(id).await?;
            let mutated = mutate(current)?;
            match self.store.update(&mutated).await {
                Ok(stored) => return Ok(stored),
                Err(TicketError::ConcurrentModification(_)) if attempt + 1 < CAS_RETRIES => {
                    warn!("write race on ticket {id}, retrying against refreshed state");
                }
                Err(e) => return Err(e),
            }
        }
        Err(TicketError::ConcurrentModification(id))
    }
}
