use crate::config::RoutingConfig;
use crate::shared::models::{Classification, Priority, SupportLine};
use log::debug;

/// Deterministic classification-to-line mapping. Precedence, first match
/// wins:
///
/// 1. FAQ theme -> line 1 (short-circuits even a Critical priority; FAQ
///    answers are low-effort regardless of classifier priority noise)
/// 2. Critical priority -> line 3
/// 3. theme in the escalate-to-3 set -> line 3
/// 4. theme in the escalate-to-2 set -> line 2
/// 5. High -> line 2, Medium/Low -> line 1
pub struct Router {
    rules: RoutingConfig,
}

impl Router {
    pub fn new(rules: RoutingConfig) -> Self {
        Self { rules }
    }

    pub fn route(&self, classification: &Classification) -> SupportLine {
        let line = self.decide(classification);
        debug!(
            "routed {} / {} to {}",
            classification.theme, classification.priority, line
        );
        line
    }

    fn decide(&self, classification: &Classification) -> SupportLine {
        if classification.theme.is_faq() {
            return SupportLine::L1;
        }
        if classification.priority == Priority::Critical {
            return SupportLine::L3;
        }
        if self.rules.escalate_to_3.contains(&classification.theme) {
            return SupportLine::L3;
        }
        if self.rules.escalate_to_2.contains(&classification.theme) {
            return SupportLine::L2;
        }
        // Critical was handled above; only High/Medium/Low reach this point.
        match classification.priority {
            Priority::High => SupportLine::L2,
            _ => SupportLine::L1,
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{RequestKind, Theme};

    fn classified(theme: Theme, priority: Priority) -> Classification {
        Classification {
            theme,
            kind: RequestKind::Incident,
            priority,
            target_system: None,
            reasoning: String::new(),
        }
    }

    #[test]
    fn every_combination_yields_a_valid_line() {
        let router = Router::default();
        for theme in Theme::ALL {
            for priority in [
                Priority::Low,
                Priority::Medium,
                Priority::High,
                Priority::Critical,
            ] {
                let line = router.route(&classified(theme, priority));
                assert!(SupportLine::ALL.contains(&line));
            }
        }
    }

    #[test]
    fn critical_goes_to_line_three() {
        let router = Router::default();
        assert_eq!(
            router.route(&classified(Theme::TechnicalIssue, Priority::Critical)),
            SupportLine::L3
        );
        assert_eq!(
            router.route(&classified(Theme::Hardware, Priority::Critical)),
            SupportLine::L3
        );
    }

    #[test]
    fn faq_short_circuits_critical() {
        // FAQ dominance over priority: a FAQ-themed request stays on line 1
        // even when the classifier marked it Critical.
        let router = Router::default();
        assert_eq!(
            router.route(&classified(Theme::FaqPassword, Priority::Critical)),
            SupportLine::L1
        );
        assert_eq!(
            router.route(&classified(Theme::FaqGeneral, Priority::High)),
            SupportLine::L1
        );
    }

    #[test]
    fn theme_sets_override_priority_mapping() {
        let router = Router::default();
        // Security escalates to line 3 even at low nominal priority.
        assert_eq!(
            router.route(&classified(Theme::Security, Priority::Low)),
            SupportLine::L3
        );
        assert_eq!(
            router.route(&classified(Theme::SystemFault, Priority::Low)),
            SupportLine::L2
        );
        assert_eq!(
            router.route(&classified(Theme::NetworkIssue, Priority::Medium)),
            SupportLine::L2
        );
    }

    #[test]
    fn priority_mapping_for_plain_themes() {
        let router = Router::default();
        assert_eq!(
            router.route(&classified(Theme::Software, Priority::High)),
            SupportLine::L2
        );
        assert_eq!(
            router.route(&classified(Theme::Software, Priority::Medium)),
            SupportLine::L1
        );
        assert_eq!(
            router.route(&classified(Theme::Access, Priority::Low)),
            SupportLine::L1
        );
    }
}
