use crate::models::{AnswerMode, GlobalPolicy};

/// Result of the high-risk domain override, applied after mode selection.
#[derive(Debug, Clone)]
pub struct GuardOutcome {
    pub mode: AnswerMode,
    pub disclaimer_required: bool,
    pub reason: Option<String>,
    /// High-risk domains that fired, for logging.
    pub triggered: Vec<String>,
}

/// Domain-keyed override. For every resolved high-risk domain tag:
/// recommendation capability is forced off — `suggest_range` is downgraded to
/// `explanation`, or to `refusal` when the domain policy says refuse — and
/// the disclaimer flag is forced on independent of mode. The disclaimer also
/// applies under `faq_hit`: the rule follows the domain, not the mode.
pub fn apply_high_risk_guard(
    mode: AnswerMode,
    reason: Option<String>,
    domains: &[String],
    policy: &GlobalPolicy,
) -> GuardOutcome {
    let mut outcome = GuardOutcome {
        mode,
        disclaimer_required: false,
        reason,
        triggered: Vec::new(),
    };

    for domain in domains {
        let Some(rule) = policy.domain_policy(domain) else {
            continue;
        };
        outcome.triggered.push(domain.clone());

        if rule.disclaimer_required {
            outcome.disclaimer_required = true;
        }

        if outcome.mode == AnswerMode::SuggestRange && !rule.allow_recommendation {
            if rule.refuse {
                outcome.mode = AnswerMode::Refusal;
                outcome.reason = Some(format!(
                    "product recommendations are disabled for the {domain} domain"
                ));
            } else {
                outcome.mode = AnswerMode::Explanation;
            }
        }
    }

    outcome
}
