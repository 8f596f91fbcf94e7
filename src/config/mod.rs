use crate::shared::models::Theme;
use std::time::Duration;

/// Top-level configuration for the routing/escalation core. Everything has a
/// working default so the core can run against a local Ollama with no env
/// setup at all.
#[derive(Debug, Clone)]
pub struct DeskConfig {
    pub inference: InferenceConfig,
    pub classifier: ClassifierConfig,
    pub routing: RoutingConfig,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Upper bound on a single inference call. A timeout counts as a
    /// classification failure and triggers the default fallback.
    pub timeout: Duration,
    /// Pause before the single retry.
    pub retry_backoff: Duration,
    /// Answer self-assessments below this confidence force escalation.
    pub confidence_threshold: u8,
}

/// Theme sets that override the generic priority-to-line mapping.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub escalate_to_2: Vec<Theme>,
    pub escalate_to_3: Vec<Theme>,
}

#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    /// How long a feedback prompt stays open before the reply is no longer
    /// treated as feedback.
    pub pending_timeout_minutes: i64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: String::new(),
            model: "mistral".to_string(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(500),
            confidence_threshold: 60,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            escalate_to_2: vec![Theme::Configuration, Theme::SystemFault, Theme::NetworkIssue],
            escalate_to_3: vec![Theme::Security],
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            pending_timeout_minutes: 30,
        }
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            inference: InferenceConfig::default(),
            classifier: ClassifierConfig::default(),
            routing: RoutingConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl DeskConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let get = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let defaults = DeskConfig::default();

        let timeout_secs: u64 = get("CLASSIFY_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid CLASSIFY_TIMEOUT_SECS: {e}"))?;
        let backoff_ms: u64 = get("CLASSIFY_RETRY_BACKOFF_MS", "500")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid CLASSIFY_RETRY_BACKOFF_MS: {e}"))?;
        let confidence_threshold: u8 = get("CONFIDENCE_THRESHOLD", "60")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid CONFIDENCE_THRESHOLD: {e}"))?;
        let feedback_timeout: i64 = get("FEEDBACK_TIMEOUT_MINUTES", "30")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid FEEDBACK_TIMEOUT_MINUTES: {e}"))?;

        Ok(Self {
            inference: InferenceConfig {
                base_url: get("INFERENCE_BASE_URL", &defaults.inference.base_url),
                api_key: get("INFERENCE_API_KEY", ""),
                model: get("INFERENCE_MODEL", &defaults.inference.model),
            },
            classifier: ClassifierConfig {
                timeout: Duration::from_secs(timeout_secs),
                retry_backoff: Duration::from_millis(backoff_ms),
                confidence_threshold,
            },
            routing: parse_routing(&defaults.routing)?,
            feedback: FeedbackConfig {
                pending_timeout_minutes: feedback_timeout,
            },
        })
    }
}

fn parse_routing(defaults: &RoutingConfig) -> Result<RoutingConfig, anyhow::Error> {
    let parse_set = |key: &str, default: &[Theme]| -> Result<Vec<Theme>, anyhow::Error> {
        match std::env::var(key) {
            Ok(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    Theme::parse_token(s)
                        .ok_or_else(|| anyhow::anyhow!("unknown theme {s:?} in {key}"))
                })
                .collect(),
            Err(_) => Ok(default.to_vec()),
        }
    };

    Ok(RoutingConfig {
        escalate_to_2: parse_set("ESCALATE_TO_LINE2_THEMES", &defaults.escalate_to_2)?,
        escalate_to_3: parse_set("ESCALATE_TO_LINE3_THEMES", &defaults.escalate_to_3)?,
    })
}
