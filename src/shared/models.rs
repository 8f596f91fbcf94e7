use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed request themes. The classifier is constrained to this taxonomy so
/// the routing table can be checked for exhaustiveness at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Access,
    TechnicalIssue,
    Software,
    Hardware,
    Security,
    Configuration,
    SystemFault,
    NetworkIssue,
    ResourceAccess,
    FaqGeneral,
    FaqPassword,
    FaqAntivirus,
}

impl Theme {
    pub const ALL: [Theme; 12] = [
        Self::Access,
        Self::TechnicalIssue,
        Self::Software,
        Self::Hardware,
        Self::Security,
        Self::Configuration,
        Self::SystemFault,
        Self::NetworkIssue,
        Self::ResourceAccess,
        Self::FaqGeneral,
        Self::FaqPassword,
        Self::FaqAntivirus,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::TechnicalIssue => "technical_issue",
            Self::Software => "software",
            Self::Hardware => "hardware",
            Self::Security => "security",
            Self::Configuration => "configuration",
            Self::SystemFault => "system_fault",
            Self::NetworkIssue => "network_issue",
            Self::ResourceAccess => "resource_access",
            Self::FaqGeneral => "faq_general",
            Self::FaqPassword => "faq_password",
            Self::FaqAntivirus => "faq_antivirus",
        }
    }

    pub fn parse_token(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.iter().copied().find(|t| t.token() == normalized)
    }

    /// FAQ themes are answered automatically and stay on line 1 regardless
    /// of classifier priority noise.
    pub fn is_faq(&self) -> bool {
        matches!(
            self,
            Self::FaqGeneral | Self::FaqPassword | Self::FaqAntivirus
        )
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Access => "System access",
            Self::TechnicalIssue => "Technical issue",
            Self::Software => "Software",
            Self::Hardware => "Hardware",
            Self::Security => "Security",
            Self::Configuration => "Configuration",
            Self::SystemFault => "System fault",
            Self::NetworkIssue => "Network issue",
            Self::ResourceAccess => "Resource access",
            Self::FaqGeneral => "FAQ - General",
            Self::FaqPassword => "FAQ - Password",
            Self::FaqAntivirus => "FAQ - Antivirus",
        };
        write!(f, "{name}")
    }
}

/// Consultation is a question that wants guidance; an incident is something
/// that stopped working. Incidents get escalated on any ambiguous feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Consultation,
    Incident,
}

impl RequestKind {
    pub fn parse_token(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "consultation" | "question" => Some(Self::Consultation),
            "incident" | "problem" => Some(Self::Incident),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Consultation => write!(f, "Consultation"),
            Self::Incident => write!(f, "Incident"),
        }
    }
}

/// Ordered severity, Low < Medium < High < Critical. The derived ordering is
/// what queue sorting relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Accepts both the P1..P4 codes the classifier prompt asks for and
    /// plain severity words.
    pub fn parse_token(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "P1" | "CRITICAL" => Some(Self::Critical),
            "P2" | "HIGH" => Some(Self::High),
            "P3" | "MEDIUM" => Some(Self::Medium),
            "P4" | "LOW" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Critical => "P1",
            Self::High => "P2",
            Self::Medium => "P3",
            Self::Low => "P4",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Known systems and services a request can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSystem {
    Portal,
    MailServer,
    Database,
    NetworkStorage,
    AuthService,
    Antivirus,
    Printer,
    Wifi,
    Vpn,
    Other,
}

impl TargetSystem {
    pub const ALL: [TargetSystem; 10] = [
        Self::Portal,
        Self::MailServer,
        Self::Database,
        Self::NetworkStorage,
        Self::AuthService,
        Self::Antivirus,
        Self::Printer,
        Self::Wifi,
        Self::Vpn,
        Self::Other,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Self::Portal => "portal",
            Self::MailServer => "mail_server",
            Self::Database => "database",
            Self::NetworkStorage => "network_storage",
            Self::AuthService => "auth_service",
            Self::Antivirus => "antivirus",
            Self::Printer => "printer",
            Self::Wifi => "wifi",
            Self::Vpn => "vpn",
            Self::Other => "other",
        }
    }

    pub fn parse_token(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.iter().copied().find(|t| t.token() == normalized)
    }
}

impl fmt::Display for TargetSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Portal => "Corporate portal",
            Self::MailServer => "Mail server",
            Self::Database => "Database",
            Self::NetworkStorage => "Network storage",
            Self::AuthService => "Authorization service",
            Self::Antivirus => "Antivirus",
            Self::Printer => "Printer/Scanner",
            Self::Wifi => "Wi-Fi",
            Self::Vpn => "VPN",
            Self::Other => "Other",
        };
        write!(f, "{name}")
    }
}

/// Support tier: 1 = service desk, 2 = technical support, 3 = expert support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SupportLine {
    L1 = 1,
    L2 = 2,
    L3 = 3,
}

impl SupportLine {
    pub const ALL: [SupportLine; 3] = [Self::L1, Self::L2, Self::L3];

    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::L1),
            2 => Some(Self::L2),
            3 => Some(Self::L3),
            _ => None,
        }
    }
}

impl fmt::Display for SupportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L1 => write!(f, "Line 1 (Service Desk)"),
            Self::L2 => write!(f, "Line 2 (Technical Support)"),
            Self::L3 => write!(f, "Line 3 (Expert Support)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    InProgress,
    WaitingForUser,
    Resolved,
    Closed,
    Escalated,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::InProgress => write!(f, "In progress"),
            Self::WaitingForUser => write!(f, "Waiting for user"),
            Self::Resolved => write!(f, "Resolved"),
            Self::Closed => write!(f, "Closed"),
            Self::Escalated => write!(f, "Escalated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackOutcome {
    Satisfied,
    NotSatisfied,
    Indeterminate,
}

impl fmt::Display for FeedbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => write!(f, "satisfied"),
            Self::NotSatisfied => write!(f, "not_satisfied"),
            Self::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Immutable classification record produced once per inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub theme: Theme,
    pub kind: RequestKind,
    pub priority: Priority,
    pub target_system: Option<TargetSystem>,
    pub reasoning: String,
}

impl Classification {
    /// Default used when the inference collaborator fails twice: a request
    /// is never left unclassified.
    pub fn fallback() -> Self {
        Self {
            theme: Theme::FaqGeneral,
            kind: RequestKind::Consultation,
            priority: Priority::Low,
            target_system: None,
            reasoning: "classification failed, defaulted".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One exchanged message in the conversation that led to a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_tokens_round_trip() {
        for theme in Theme::ALL {
            assert_eq!(Theme::parse_token(theme.token()), Some(theme));
        }
        assert_eq!(
            Theme::parse_token("Network Issue"),
            Some(Theme::NetworkIssue)
        );
        assert_eq!(Theme::parse_token("nonsense"), None);
    }

    #[test]
    fn faq_themes_flagged() {
        assert!(Theme::FaqGeneral.is_faq());
        assert!(Theme::FaqPassword.is_faq());
        assert!(Theme::FaqAntivirus.is_faq());
        assert!(!Theme::Security.is_faq());
        assert!(!Theme::TechnicalIssue.is_faq());
    }

    #[test]
    fn priority_parse_accepts_codes_and_words() {
        assert_eq!(Priority::parse_token("P1"), Some(Priority::Critical));
        assert_eq!(Priority::parse_token("p4"), Some(Priority::Low));
        assert_eq!(Priority::parse_token("high"), Some(Priority::High));
        assert_eq!(Priority::parse_token("P9"), None);
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn support_line_numbers() {
        assert_eq!(SupportLine::L2.number(), 2);
        assert_eq!(SupportLine::from_number(3), Some(SupportLine::L3));
        assert_eq!(SupportLine::from_number(0), None);
        assert!(SupportLine::L3 > SupportLine::L1);
    }

    #[test]
    fn request_kind_parse() {
        assert_eq!(
            RequestKind::parse_token("incident"),
            Some(RequestKind::Incident)
        );
        assert_eq!(
            RequestKind::parse_token("Consultation"),
            Some(RequestKind::Consultation)
        );
        assert_eq!(RequestKind::parse_token(""), None);
    }
}
