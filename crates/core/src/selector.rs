use crate::models::{AnswerMode, GlobalPolicy, QueryContext};
use crate::resolver::Resolution;

/// Mode selection outcome. `reason` is populated only when the mode is a
/// refusal; every other mode stays silent about rule evaluation.
#[derive(Debug, Clone)]
pub struct Selection {
    pub mode: AnswerMode,
    pub reason: Option<String>,
}

/// The answer-mode state machine. Precedence, first match wins:
///
/// 1. exact FAQ match — overrides everything, including incomplete slots
/// 2. explicit model comparison — explanation, outside the slot-gated flow
/// 3. any required slot absent — clarification, no exception
/// 4. high-risk domain with refuse-policy — refusal with mandatory reason
/// 5. slots complete and a product range can be formed — recommendation
/// 6. everything else — explanation
///
/// Total and deterministic: every context maps to exactly one mode.
pub fn select_mode(
    ctx: &QueryContext,
    resolution: Option<&Resolution>,
    domains: &[String],
    policy: &GlobalPolicy,
) -> Selection {
    if ctx.faq_hit.is_some() {
        return Selection {
            mode: AnswerMode::FaqHit,
            reason: None,
        };
    }

    if ctx.model_compare {
        return Selection {
            mode: AnswerMode::Explanation,
            reason: None,
        };
    }

    if !ctx.conditions_complete() {
        return Selection {
            mode: AnswerMode::AskClarifying,
            reason: None,
        };
    }

    for domain in domains {
        if let Some(rule) = policy.domain_policy(domain) {
            if !rule.allow_recommendation && rule.refuse {
                return Selection {
                    mode: AnswerMode::Refusal,
                    reason: Some(format!(
                        "product recommendations are disabled for the {domain} domain"
                    )),
                };
            }
        }
    }

    if can_form_product_range(resolution) {
        return Selection {
            mode: AnswerMode::SuggestRange,
            reason: None,
        };
    }

    Selection {
        mode: AnswerMode::Explanation,
        reason: None,
    }
}

/// A qualifying range exists when at least one permitted document survived
/// resolution outside the FAQ tier.
fn can_form_product_range(resolution: Option<&Resolution>) -> bool {
    match resolution {
        Some(resolution) => !resolution.from_faq_tier && !resolution.permitted.is_empty(),
        None => false,
    }
}

/// Final visibility gate for structured product cards. FAQ answers never show
/// cards, even when the matched entry is itself product-related.
pub fn show_product_card(mode: AnswerMode, conditions_complete: bool) -> bool {
    matches!(mode, AnswerMode::SuggestRange) && conditions_complete
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, DomainPolicy, SlotValues};
    use std::collections::BTreeMap;

    fn complete_slots() -> SlotValues {
        SlotValues {
            measurement_object: Some("display".to_string()),
            measurement_metric: Some("luminance".to_string()),
            usage_context: Some("production_qc".to_string()),
        }
    }

    fn policy_with_medical(refuse: bool) -> GlobalPolicy {
        let mut high_risk = BTreeMap::new();
        high_risk.insert(
            "medical".to_string(),
            DomainPolicy {
                allow_recommendation: false,
                disclaimer_required: true,
                refuse,
            },
        );
        GlobalPolicy {
            forbid_cross_tier_synthesis: true,
            index_document: "product_index".to_string(),
            high_risk,
        }
    }

    fn product_resolution() -> Resolution {
        Resolution {
            tier: 2,
            permitted: vec![Document::new("product_a", "catalog")],
            suppressed_tiers: Vec::new(),
            tie_broken: false,
            from_faq_tier: false,
        }
    }

    #[test]
    fn faq_hit_overrides_missing_slots() {
        let ctx = QueryContext {
            faq_hit: Some("faq_scope".to_string()),
            ..QueryContext::default()
        };
        let selection = select_mode(&ctx, None, &[], &policy_with_medical(true));
        assert_eq!(selection.mode, AnswerMode::FaqHit);
    }

    #[test]
    fn model_comparison_explains_despite_missing_slots() {
        let ctx = QueryContext {
            model_compare: true,
            ..QueryContext::default()
        };
        let selection = select_mode(
            &ctx,
            Some(&product_resolution()),
            &[],
            &policy_with_medical(true),
        );
        assert_eq!(selection.mode, AnswerMode::Explanation);
    }

    #[test]
    fn missing_slot_forces_clarification() {
        let ctx = QueryContext::default();
        let selection = select_mode(
            &ctx,
            Some(&product_resolution()),
            &[],
            &policy_with_medical(true),
        );
        assert_eq!(selection.mode, AnswerMode::AskClarifying);
        assert!(selection.reason.is_none());
    }

    #[test]
    fn refuse_policy_produces_refusal_with_reason() {
        let ctx = QueryContext {
            slots: complete_slots(),
            ..QueryContext::default()
        };
        let selection = select_mode(
            &ctx,
            Some(&product_resolution()),
            &["medical".to_string()],
            &policy_with_medical(true),
        );
        assert_eq!(selection.mode, AnswerMode::Refusal);
        assert!(selection.reason.is_some());
    }

    #[test]
    fn complete_slots_with_products_suggest_a_range() {
        let ctx = QueryContext {
            slots: complete_slots(),
            ..QueryContext::default()
        };
        let resolution = product_resolution();
        let selection = select_mode(&ctx, Some(&resolution), &[], &policy_with_medical(true));
        assert_eq!(selection.mode, AnswerMode::SuggestRange);
    }

    #[test]
    fn no_documents_means_explanation() {
        let ctx = QueryContext {
            slots: complete_slots(),
            ..QueryContext::default()
        };
        let selection = select_mode(&ctx, None, &[], &policy_with_medical(true));
        assert_eq!(selection.mode, AnswerMode::Explanation);
    }

    #[test]
    fn card_shown_only_for_complete_suggest_range() {
        assert!(show_product_card(AnswerMode::SuggestRange, true));
        assert!(!show_product_card(AnswerMode::SuggestRange, false));
        assert!(!show_product_card(AnswerMode::FaqHit, true));
        assert!(!show_product_card(AnswerMode::AskClarifying, true));
        assert!(!show_product_card(AnswerMode::Refusal, true));
        assert!(!show_product_card(AnswerMode::Explanation, true));
    }
}
