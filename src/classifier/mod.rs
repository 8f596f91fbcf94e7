use crate::config::ClassifierConfig;
use crate::llm::{InferenceError, InferenceProvider};
use crate::shared::models::{
    ChatTurn, Classification, Priority, RequestKind, SupportLine, TargetSystem, Theme,
};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

static JSON_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// LLM-backed request classifier. Maps free-text requests onto the fixed
/// label taxonomy; on inference failure it retries once with backoff and
/// then falls back to a safe default, so callers never see an error.
pub struct Classifier {
    provider: Arc<dyn InferenceProvider>,
    config: ClassifierConfig,
}

/// Self-assessment of an automated answer, used to decide whether a human
/// needs to take over even though an answer was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerAssessment {
    pub resolved: bool,
    pub confidence: u8,
    pub needs_escalation: bool,
    pub escalation_reason: Option<String>,
}

#[derive(Deserialize)]
struct RawClassification {
    theme: Option<String>,
    kind: Option<String>,
    priority: Option<String>,
    target_system: Option<String>,
    reasoning: Option<String>,
}

#[derive(Deserialize)]
struct RawAssessment {
    resolved: Option<bool>,
    confidence: Option<u8>,
    needs_escalation: Option<bool>,
    escalation_reason: Option<String>,
}

impl Classifier {
    pub fn new(provider: Arc<dyn InferenceProvider>, config: ClassifierConfig) -> Self {
        Self { provider, config }
    }

    /// Classify a request, optionally in the context of prior conversation.
    /// Infallible by contract: one retry with backoff, then the default
    /// Low / FAQ classification.
    pub async fn classify(&self, description: &str, history: &[ChatTurn]) -> Classification {
        let prompt = build_classification_prompt(description, history);

        for attempt in 0..2u32 {
            match self.classify_once(&prompt).await {
                Ok(classification) => {
                    info!(
                        "classified request as {} / {} / {}",
                        classification.theme, classification.kind, classification.priority
                    );
                    return classification;
                }
                Err(e) => {
                    warn!("classification attempt {} failed: {e}", attempt + 1);
                    if attempt == 0 {
                        let jitter = rand::thread_rng().gen_range(0..250);
                        tokio::time::sleep(
                            self.config.retry_backoff + Duration::from_millis(jitter),
                        )
                        .await;
                    }
                }
            }
        }

        warn!("classification failed after retry, using default classification");
        Classification::fallback()
    }

    async fn classify_once(&self, prompt: &str) -> Result<Classification, InferenceError> {
        let config = serde_json::json!({
            "temperature": 0.1,
            "max_tokens": 512
        });

        let raw = tokio::time::timeout(self.config.timeout, self.provider.generate(prompt, &config))
            .await
            .map_err(|_| "inference call timed out")??;

        parse_classification(&raw)
    }

    /// Judge whether an automated answer actually resolves the question.
    /// Assessments below the configured confidence threshold force
    /// escalation, as does a routing target above line 1. Fails safe to
    /// "answer stands" so a broken assessor does not spam operators.
    pub async fn assess_answer(
        &self,
        question: &str,
        answer: &str,
        line: SupportLine,
    ) -> AnswerAssessment {
        let prompt = build_assessment_prompt(question, answer);
        let config = serde_json::json!({
            "temperature": 0.0,
            "max_tokens": 256
        });

        let raw = match tokio::time::timeout(
            self.config.timeout,
            self.provider.generate(&prompt, &config),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!("answer assessment failed: {e}");
                return AnswerAssessment::default_pass();
            }
            Err(_) => {
                warn!("answer assessment timed out");
                return AnswerAssessment::default_pass();
            }
        };

        let mut assessment = match parse_assessment(&raw) {
            Ok(a) => a,
            Err(e) => {
                warn!("malformed answer assessment: {e}");
                return AnswerAssessment::default_pass();
            }
        };

        if assessment.confidence < self.config.confidence_threshold
            && !assessment.needs_escalation
        {
            assessment.needs_escalation = true;
            assessment.resolved = false;
            assessment.escalation_reason = Some(format!(
                "confidence {}% below threshold {}%",
                assessment.confidence, self.config.confidence_threshold
            ));
        }

        if line > SupportLine::L1 {
            assessment.needs_escalation = true;
            assessment.escalation_reason = Some(format!("request routed to {line}"));
        }

        debug!(
            "answer assessment: resolved={} confidence={} escalate={}",
            assessment.resolved, assessment.confidence, assessment.needs_escalation
        );
        assessment
    }
}

impl AnswerAssessment {
    fn default_pass() -> Self {
        Self {
            resolved: true,
            confidence: 70,
            needs_escalation: false,
            escalation_reason: None,
        }
    }
}

fn build_classification_prompt(description: &str, history: &[ChatTurn]) -> String {
    let themes = Theme::ALL
        .iter()
        .map(|t| format!("- {}", t.token()))
        .collect::<Vec<_>>()
        .join("\n");
    let systems = TargetSystem::ALL
        .iter()
        .map(|s| format!("- {}", s.token()))
        .collect::<Vec<_>>()
        .join("\n");

    // Last few turns are enough context; full histories blow the prompt up.
    let context = if history.is_empty() {
        String::new()
    } else {
        let tail = history
            .iter()
            .rev()
            .take(3)
            .rev()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\nCONVERSATION CONTEXT:\n{tail}\n")
    };

    format!(
        r#"You are an IT support request classifier.

Only classify IT support requests (software, access, hardware, network).
If the request is not about IT support, return priority "P4", theme
"faq_general" and kind "consultation".

Determine:
1. theme: one of
{themes}
2. kind: "consultation" (a question, how-to) or "incident" (something is
   broken, "does not work", an error)
3. priority:
   - P1: full outage, data leak, critical failure
   - P2: outage for a group of users, serious problem
   - P3: degraded functionality, partial outage
   - P4: minor issues, FAQ, general questions
4. target_system: one of
{systems}
   or null if unclear
{context}
REQUEST:
{description}

Respond with JSON only:
{{
    "theme": "...",
    "kind": "consultation" or "incident",
    "priority": "P1/P2/P3/P4",
    "target_system": "... or null",
    "reasoning": "short justification"
}}"#
    )
}

fn build_assessment_prompt(question: &str, answer: &str) -> String {
    format!(
        r#"You are a support quality reviewer. Judge how useful the assistant
answer is for the user question.

USER QUESTION:
{question}

ASSISTANT ANSWER:
{answer}

Rules:
- If the answer says "I cannot", "please contact" or asks the user to
  clarify, set needs_escalation to true.
- Score confidence honestly, do not hide uncertainty.

Respond with JSON only:
{{
    "resolved": true/false,
    "confidence": 0-100,
    "needs_escalation": true/false,
    "escalation_reason": "reason or null"
}}"#
    )
}

/// Extract and validate the JSON block from a model reply. Tolerates
/// markdown fences, surrounding prose and smart quotes.
fn parse_classification(response: &str) -> Result<Classification, InferenceError> {
    let raw: RawClassification = parse_json_block(response)?;

    let theme = raw
        .theme
        .as_deref()
        .and_then(Theme::parse_token)
        .unwrap_or(Theme::TechnicalIssue);
    let kind = raw
        .kind
        .as_deref()
        .and_then(RequestKind::parse_token)
        .unwrap_or(RequestKind::Consultation);
    let priority = raw
        .priority
        .as_deref()
        .and_then(Priority::parse_token)
        .unwrap_or(Priority::Medium);
    let target_system = raw.target_system.as_deref().and_then(TargetSystem::parse_token);

    Ok(Classification {
        theme,
        kind,
        priority,
        target_system,
        reasoning: raw
            .reasoning
            .unwrap_or_else(|| "automatic classification".to_string()),
    })
}

fn parse_assessment(response: &str) -> Result<AnswerAssessment, InferenceError> {
    let raw: RawAssessment = parse_json_block(response)?;
    Ok(AnswerAssessment {
        resolved: raw.resolved.unwrap_or(false),
        confidence: raw.confidence.unwrap_or(50).min(100),
        needs_escalation: raw.needs_escalation.unwrap_or(false),
        escalation_reason: raw.escalation_reason,
    })
}

fn parse_json_block<T: serde::de::DeserializeOwned>(response: &str) -> Result<T, InferenceError> {
    let sanitized = response
        .replace(['\u{201c}', '\u{201d}', '\u{201e}'], "\"");
    let block = JSON_BLOCK
        .find(&sanitized)
        .map(|m| m.as_str())
        .ok_or("no JSON object in model reply")?;
    Ok(serde_json::from_str(block)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct CannedProvider(String);

    #[async_trait]
    impl InferenceProvider for CannedProvider {
        async fn generate(&self, _prompt: &str, _config: &Value) -> Result<String, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl InferenceProvider for FailingProvider {
        async fn generate(&self, _prompt: &str, _config: &Value) -> Result<String, InferenceError> {
            Err("inference backend down".into())
        }
    }

    fn fast_config() -> ClassifierConfig {
        ClassifierConfig {
            timeout: Duration::from_secs(1),
            retry_backoff: Duration::from_millis(1),
            confidence_threshold: 60,
        }
    }

    #[test]
    fn parse_plain_json() {
        let c = parse_classification(
            r#"{"theme": "network_issue", "kind": "incident", "priority": "P2",
                "target_system": "vpn", "reasoning": "VPN drops for a team"}"#,
        )
        .unwrap();
        assert_eq!(c.theme, Theme::NetworkIssue);
        assert_eq!(c.kind, RequestKind::Incident);
        assert_eq!(c.priority, Priority::High);
        assert_eq!(c.target_system, Some(TargetSystem::Vpn));
    }

    #[test]
    fn parse_json_with_fences_and_prose() {
        let c = parse_classification(
            "Here is the classification:\n```json\n{\"theme\": \"faq_password\", \"kind\": \"consultation\", \"priority\": \"P4\", \"target_system\": null, \"reasoning\": \"password reset\"}\n```",
        )
        .unwrap();
        assert_eq!(c.theme, Theme::FaqPassword);
        assert_eq!(c.priority, Priority::Low);
        assert_eq!(c.target_system, None);
    }

    #[test]
    fn parse_maps_unknown_labels_to_defaults() {
        let c = parse_classification(
            r#"{"theme": "weather", "kind": "rant", "priority": "P7",
                "target_system": "toaster", "reasoning": "?"}"#,
        )
        .unwrap();
        assert_eq!(c.theme, Theme::TechnicalIssue);
        assert_eq!(c.kind, RequestKind::Consultation);
        assert_eq!(c.priority, Priority::Medium);
        assert_eq!(c.target_system, None);
    }

    #[test]
    fn parse_rejects_reply_without_json() {
        assert!(parse_classification("I could not classify that, sorry").is_err());
    }

    #[tokio::test]
    async fn classify_happy_path() {
        let provider = Arc::new(CannedProvider(
            r#"{"theme": "access", "kind": "incident", "priority": "P1",
                "target_system": "auth_service", "reasoning": "nobody can log in"}"#
                .to_string(),
        ));
        let classifier = Classifier::new(provider, fast_config());
        let c = classifier.classify("nobody can log in", &[]).await;
        assert_eq!(c.theme, Theme::Access);
        assert_eq!(c.priority, Priority::Critical);
    }

    #[tokio::test]
    async fn classify_falls_back_when_inference_always_fails() {
        let classifier = Classifier::new(Arc::new(FailingProvider), fast_config());
        let c = classifier.classify("my VPN is broken", &[]).await;
        assert_eq!(c, Classification::fallback());
        assert_eq!(c.priority, Priority::Low);
        assert!(c.theme.is_faq());
    }

    #[tokio::test]
    async fn assessment_below_threshold_escalates() {
        let provider = Arc::new(CannedProvider(
            r#"{"resolved": true, "confidence": 30, "needs_escalation": false,
                "escalation_reason": null}"#
                .to_string(),
        ));
        let classifier = Classifier::new(provider, fast_config());
        let a = classifier
            .assess_answer("how do I reset?", "try rebooting", SupportLine::L1)
            .await;
        assert!(a.needs_escalation);
        assert!(!a.resolved);
        assert!(a.escalation_reason.unwrap().contains("threshold"));
    }

    #[tokio::test]
    async fn assessment_forces_escalation_above_line_one() {
        let provider = Arc::new(CannedProvider(
            r#"{"resolved": true, "confidence": 95, "needs_escalation": false,
                "escalation_reason": null}"#
                .to_string(),
        ));
        let classifier = Classifier::new(provider, fast_config());
        let a = classifier
            .assess_answer("db is down", "restart it", SupportLine::L3)
            .await;
        assert!(a.needs_escalation);
    }

    #[tokio::test]
    async fn assessment_fails_safe() {
        let classifier = Classifier::new(Arc::new(FailingProvider), fast_config());
        let a = classifier
            .assess_answer("q", "a", SupportLine::L1)
            .await;
        assert!(!a.needs_escalation);
        assert!(a.resolved);
    }
}
