use std::path::PathBuf;
use std::sync::Arc;

use lumen_core::{AnswerMode, Document, SlotKind, SlotValues};
use lumen_engine::GovernanceEngine;
use lumen_observability::DecisionMetrics;
use lumen_rules::load_rules;
use serde_json::json;

fn rules_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../rules/default.rules")
}

fn engine() -> GovernanceEngine {
    let rules = load_rules(rules_path()).expect("default rules should load");
    GovernanceEngine::new(Arc::new(rules), DecisionMetrics::shared())
}

fn candidates() -> Vec<Document> {
    vec![
        Document::new("product_sri_pl_6000", "catalog"),
        Document::new("product_sri_2000", "catalog"),
        Document::new("appnote_display_luminance", "appnotes"),
        Document::new("blog_uv_basics", "crawl"),
    ]
}

fn permitted_ids(decision: &lumen_core::Decision) -> Vec<&str> {
    decision
        .permitted_documents
        .iter()
        .map(|doc| doc.id.as_str())
        .collect()
}

#[test]
fn shipped_rules_file_is_valid() {
    let rules = load_rules(rules_path()).expect("default rules should load");
    assert_eq!(rules.table.tier_count(), 4);
    assert_eq!(rules.table.faq_tier(), 4);
    assert_eq!(rules.faq.rules().len(), 3);
    assert!(rules.policy.is_high_risk("medical"));
    assert!(rules.policy.is_high_risk("uvc"));
}

#[test]
fn missing_slots_always_ask_before_recommending() {
    let engine = engine();
    let ctx = engine.classify(
        "which meter should I buy for our production line?",
        SlotValues::default(),
    );

    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::AskClarifying);
    assert!(!decision.show_product_card);
    assert!(decision.permitted_documents.is_empty());
    assert!(decision.missing_slots.contains(&SlotKind::MeasurementObject));
    assert!(decision.missing_slots.contains(&SlotKind::MeasurementMetric));
}

#[test]
fn faq_match_wins_even_when_slots_are_complete() {
    let engine = engine();
    let ctx = engine.classify(
        "what's the price of a luminance meter for the display on our production line?",
        SlotValues::default(),
    );
    assert!(ctx.conditions_complete());
    assert_eq!(ctx.faq_hit.as_deref(), Some("faq_sales_scope"));

    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::FaqHit);
    assert!(!decision.show_product_card);
    assert_eq!(permitted_ids(&decision), vec!["faq_sales_scope"]);
}

#[test]
fn complete_slots_with_products_show_a_card() {
    let engine = engine();
    let ctx = engine.classify(
        "luminance of a display panel for incoming inspection",
        SlotValues::default(),
    );
    assert!(ctx.conditions_complete());

    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::SuggestRange);
    assert!(decision.show_product_card);
    assert!(!decision.disclaimer_required);
    assert_eq!(
        permitted_ids(&decision),
        vec!["product_sri_2000", "product_sri_pl_6000"]
    );
}

#[test]
fn medical_queries_never_get_a_recommendation() {
    let engine = engine();

    // Incomplete slots: clarification, but the disclaimer still applies.
    let ctx = engine.classify("a lamp for medical use", SlotValues::default());
    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::AskClarifying);
    assert!(decision.disclaimer_required);
    assert!(!decision.show_product_card);

    // Complete slots: the refuse policy turns the would-be recommendation
    // into a refusal with a populated reason.
    let ctx = engine.classify(
        "irradiance of a medical phototherapy lamp for research use",
        SlotValues::default(),
    );
    assert!(ctx.conditions_complete());
    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::Refusal);
    assert!(decision.reason.is_some());
    assert!(decision.disclaimer_required);
    assert!(!decision.show_product_card);
    assert!(decision.permitted_documents.is_empty());
}

#[test]
fn uvc_recommendation_downgrades_to_explanation_with_disclaimer() {
    let engine = engine();
    let ctx = engine.classify(
        "uvc led source dose measurement on the production line",
        SlotValues::default(),
    );
    assert!(ctx.conditions_complete());

    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::Explanation);
    assert!(decision.disclaimer_required);
    assert!(!decision.show_product_card);
}

#[test]
fn metric_alone_missing_asks_without_a_disclaimer() {
    let engine = engine();
    let ctx = engine.classify(
        "we have a display on our production line",
        SlotValues::default(),
    );
    assert!(ctx.faq_hit.is_none());

    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::AskClarifying);
    assert_eq!(decision.missing_slots, vec![SlotKind::MeasurementMetric]);
    assert!(!decision.show_product_card);
    assert!(!decision.disclaimer_required);
}

#[test]
fn faq_hit_in_a_high_risk_domain_keeps_the_disclaimer() {
    let engine = engine();
    let ctx = engine.classify(
        "price for irradiance measurement of a medical phototherapy lamp for research use",
        SlotValues::default(),
    );
    assert!(ctx.conditions_complete());
    assert_eq!(ctx.faq_hit.as_deref(), Some("faq_sales_scope"));

    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::FaqHit);
    assert!(decision.disclaimer_required);
    assert!(!decision.show_product_card);
}

#[test]
fn candidate_order_does_not_change_the_decision() {
    let engine = engine();
    let ctx = engine.classify(
        "luminance of a display panel for incoming inspection",
        SlotValues::default(),
    );

    let forward = engine.decide(&ctx, &candidates());
    let mut reversed = candidates();
    reversed.reverse();
    let backward = engine.decide(&ctx, &reversed);

    assert_eq!(forward.mode, backward.mode);
    assert_eq!(permitted_ids(&forward), permitted_ids(&backward));
    assert_eq!(forward.show_product_card, backward.show_product_card);
}

#[test]
fn externally_supplied_slots_win_over_extraction() {
    let engine = engine();
    let supplied = SlotValues {
        measurement_object: Some("vcsel".to_string()),
        ..SlotValues::default()
    };
    let ctx = engine.classify(
        "luminance of a display panel for incoming inspection",
        supplied,
    );
    assert_eq!(ctx.slots.measurement_object.as_deref(), Some("vcsel"));
    assert_eq!(ctx.slots.measurement_metric.as_deref(), Some("luminance"));
}

#[test]
fn unranked_candidates_are_refused_not_merged() {
    let engine = engine();
    let candidates: Vec<Document> = serde_json::from_value(json!([
        {"id": "forum_post_1", "source": "crawl"},
        {"id": "forum_post_2", "source": "crawl"}
    ]))
    .expect("candidate JSON should deserialize");

    let ctx = engine.classify(
        "luminance of a display panel for incoming inspection",
        SlotValues::default(),
    );
    let decision = engine.decide(&ctx, &candidates);
    assert_eq!(decision.mode, AnswerMode::Refusal);
    assert!(decision.reason.is_some());
    assert!(decision.permitted_documents.is_empty());
    assert_eq!(engine.metrics().snapshot().unresolved_conflicts_total, 1);
}

#[test]
fn faq_hit_wins_over_unranked_candidates() {
    let engine = engine();
    let ctx = engine.classify("what's the price of a UVC meter?", SlotValues::default());
    assert_eq!(ctx.faq_hit.as_deref(), Some("faq_sales_scope"));

    let decision = engine.decide(&ctx, &[Document::new("forum_post_1", "crawl")]);
    assert_eq!(decision.mode, AnswerMode::FaqHit);
    assert_eq!(permitted_ids(&decision), vec!["faq_sales_scope"]);
    assert_eq!(engine.metrics().snapshot().unresolved_conflicts_total, 0);
}

#[test]
fn model_comparisons_explain_instead_of_asking() {
    let engine = engine();
    let ctx = engine.classify("SRI-2000 vs SRI-4000uvc", SlotValues::default());
    assert!(ctx.model_compare);

    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::Explanation);
    assert!(!decision.show_product_card);
}

#[test]
fn same_tier_ties_are_recorded_as_policy_tension() {
    let engine = engine();
    let ctx = engine.classify(
        "luminance of a display panel for incoming inspection",
        SlotValues::default(),
    );
    let decision = engine.decide(&ctx, &candidates());
    assert_eq!(decision.mode, AnswerMode::SuggestRange);

    let tensions = engine.tension_events();
    assert_eq!(tensions.len(), 1);
    assert_eq!(tensions[0].tier, 3);
    assert_eq!(
        tensions[0].document_ids,
        vec!["product_sri_2000", "product_sri_pl_6000"]
    );
}

#[test]
fn repeated_pipeline_runs_are_identical() {
    let engine = engine();
    let queries = [
        "which meter should I buy for our production line?",
        "uvc led source dose measurement on the production line",
        "luminance of a display panel for incoming inspection",
        "what's the stock situation for the SRI-2000?",
    ];

    for query in queries {
        let ctx = engine.classify(query, SlotValues::default());
        let first = engine.decide(&ctx, &candidates());
        let second = engine.decide(&ctx, &candidates());
        assert_eq!(first.mode, second.mode, "mode drifted for {query}");
        assert_eq!(permitted_ids(&first), permitted_ids(&second));
        assert_eq!(first.show_product_card, second.show_product_card);
        assert_eq!(first.disclaimer_required, second.disclaimer_required);
    }
}
