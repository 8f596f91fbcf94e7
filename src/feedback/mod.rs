use crate::config::FeedbackConfig;
use crate::shared::models::{FeedbackOutcome, RequestKind};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Phrases that signal the automated answer resolved the issue.
const SATISFACTION_MARKERS: &[&str] = &[
    "спасибо",
    "благодарю",
    "помогло",
    "решило",
    "работает",
    "отлично",
    "хорошо",
    "понял",
    "ясно",
    "разобрался",
    "все ок",
    "все хорошо",
    "проблема решена",
    "решено",
];

/// Phrases that signal the problem persists.
const DISSATISFACTION_MARKERS: &[&str] = &[
    "не помогло",
    "не работает",
    "не решило",
    "не понял",
    "не ясно",
    "не разобрался",
    "все еще",
    "по-прежнему",
    "плохо",
    "не то",
    "неправильно",
    "ошибка",
    "не то что нужно",
];

const EXPLICIT_YES: &[&str] = &["да", "yes", "конечно", "ага", "угу"];
const EXPLICIT_NO: &[&str] = &["нет", "no", "не", "неа"];

const CLARIFICATION_QUESTIONS: &[&str] = &[
    "Помог ли вам ответ?",
    "Решило ли это вашу проблему?",
    "Все ли понятно?",
    "Нужна ли дополнительная помощь?",
    "Работает ли это сейчас?",
];

#[derive(Debug, Clone)]
pub struct PendingFeedback {
    pub ticket_id: u64,
    pub question: String,
    pub asked_at: DateTime<Utc>,
}

/// Decides whether an AI answer resolved the user's issue, based on lexical
/// matching of the follow-up reply. Tracks one open feedback prompt per user
/// with a timeout so stale replies are not misread as feedback.
pub struct FeedbackAnalyzer {
    pending: Mutex<HashMap<i64, PendingFeedback>>,
    timeout: Duration,
}

impl FeedbackAnalyzer {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout: Duration::minutes(config.pending_timeout_minutes),
        }
    }

    fn pending_map(&self) -> MutexGuard<'_, HashMap<i64, PendingFeedback>> {
        // A poisoned lock still holds a usable map; one panicked caller must
        // not take the registry down for every user.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ask for feedback only when an answer was actually delivered (a good
    /// RAG answer or an FAQ hit) and the user has no open feedback prompt.
    pub fn should_ask_feedback(&self, user_id: i64, has_good_answer: bool, is_faq: bool) -> bool {
        (has_good_answer || is_faq) && !self.pending_map().contains_key(&user_id)
    }

    pub fn feedback_question(&self) -> &'static str {
        CLARIFICATION_QUESTIONS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(CLARIFICATION_QUESTIONS[0])
    }

    pub fn register_feedback_request(&self, user_id: i64, ticket_id: u64, question: &str) {
        self.pending_map().insert(
            user_id,
            PendingFeedback {
                ticket_id,
                question: question.to_string(),
                asked_at: Utc::now(),
            },
        );
    }

    pub fn clear_feedback_request(&self, user_id: i64) {
        self.pending_map().remove(&user_id);
    }

    /// Open feedback prompt for a user, dropping it if it timed out.
    pub fn pending_feedback(&self, user_id: i64) -> Option<PendingFeedback> {
        let mut pending = self.pending_map();
        let stale = pending
            .get(&user_id)
            .map(|p| Utc::now() - p.asked_at > self.timeout)?;
        if stale {
            pending.remove(&user_id);
            return None;
        }
        pending.get(&user_id).cloned()
    }

    /// Whether a message looks like a reply to an open feedback prompt:
    /// a short yes/no or anything carrying a satisfaction signal.
    pub fn is_feedback_reply(&self, user_id: i64, message: &str) -> bool {
        if self.pending_feedback(user_id).is_none() {
            return false;
        }
        let lower = message.to_lowercase();
        let tokens: Vec<&str> = word_tokens(&lower);
        if tokens.len() <= 3
            && tokens
                .iter()
                .any(|t| EXPLICIT_YES.contains(t) || EXPLICIT_NO.contains(t))
        {
            return true;
        }
        SATISFACTION_MARKERS
            .iter()
            .chain(DISSATISFACTION_MARKERS)
            .any(|marker| lower.contains(marker))
    }

    /// Lexical verdict on a feedback reply. A tie or no signal at all is
    /// Indeterminate; the escalation decision is taken separately.
    pub fn analyze_feedback(&self, user_id: i64, reply: &str) -> FeedbackOutcome {
        let lower = reply.to_lowercase();
        let tokens: Vec<&str> = word_tokens(&lower);

        // Dissatisfaction phrases claim their text first: the "помогло"
        // inside "не помогло" must not also score as satisfaction.
        let claimed: Vec<(usize, usize)> = DISSATISFACTION_MARKERS
            .iter()
            .flat_map(|marker| occurrences(&lower, marker))
            .collect();
        let satisfied = SATISFACTION_MARKERS
            .iter()
            .filter(|marker| {
                occurrences(&lower, marker).into_iter().any(|(start, end)| {
                    !claimed.iter().any(|&(cs, ce)| cs <= start && end <= ce)
                })
            })
            .count();
        let dissatisfied = DISSATISFACTION_MARKERS
            .iter()
            .filter(|marker| lower.contains(*marker))
            .count();

        let outcome = if tokens.iter().any(|t| EXPLICIT_YES.contains(t)) && dissatisfied == 0 {
            FeedbackOutcome::Satisfied
        } else if tokens.iter().any(|t| EXPLICIT_NO.contains(t)) && satisfied == 0 {
            FeedbackOutcome::NotSatisfied
        } else if satisfied > dissatisfied {
            FeedbackOutcome::Satisfied
        } else if dissatisfied > satisfied {
            FeedbackOutcome::NotSatisfied
        } else {
            FeedbackOutcome::Indeterminate
        };

        debug!(
            "feedback from user {user_id}: {outcome} (satisfied={satisfied}, dissatisfied={dissatisfied})"
        );
        outcome
    }

    /// Escalation decision after feedback. Dissatisfaction always escalates;
    /// for incidents even an ambiguous reply does, since "it isn't working"
    /// deserves human eyes. Consultations get the benefit of the doubt.
    pub fn should_escalate_after_feedback(outcome: FeedbackOutcome, kind: RequestKind) -> bool {
        let escalate = match outcome {
            FeedbackOutcome::NotSatisfied => true,
            FeedbackOutcome::Indeterminate => kind == RequestKind::Incident,
            FeedbackOutcome::Satisfied => false,
        };
        if escalate {
            info!("feedback outcome {outcome} on {kind} triggers escalation");
        }
        escalate
    }
}

fn occurrences(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        spans.push((start, start + needle.len()));
        from = start + needle.len();
    }
    spans
}

fn word_tokens(lower: &str) -> Vec<&str> {
    lower
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect()
}
