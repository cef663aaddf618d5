use std::sync::Arc;
use std::time::Instant;

use lumen_core::{
    apply_high_risk_guard, extract_domains, extract_slots, looks_like_model_compare,
    normalize_text, resolve, select_mode, show_product_card, AnswerMode, Decision, Document,
    QueryContext, ResolveError, Resolution, SlotValues,
};
use lumen_observability::DecisionMetrics;
use lumen_rules::RuleSet;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

const UNRANKED_CONFLICT_REASON: &str =
    "retrieved sources conflict across priority tiers and cannot be combined";

/// A same-tier tie that was resolved by the deterministic tie-break. Never
/// user-visible, but kept for operators to review rule tension.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyTension {
    pub trace_id: Uuid,
    pub tier: u32,
    pub document_ids: Vec<String>,
}

/// The decision pipeline behind `decide`: priority resolution, answer-mode
/// selection, the high-risk guard, and the product-card gate. Holds the
/// immutable rule set; every call is pure with respect to other requests.
pub struct GovernanceEngine {
    rules: Arc<RuleSet>,
    metrics: Arc<DecisionMetrics>,
    tensions: RwLock<Vec<PolicyTension>>,
}

impl GovernanceEngine {
    pub fn new(rules: Arc<RuleSet>, metrics: Arc<DecisionMetrics>) -> Self {
        Self {
            rules,
            metrics,
            tensions: RwLock::new(Vec::new()),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn metrics(&self) -> &DecisionMetrics {
        &self.metrics
    }

    /// Policy-tension events recorded since startup, oldest first.
    pub fn tension_events(&self) -> Vec<PolicyTension> {
        self.tensions.read().clone()
    }

    /// Build the per-request context: keyword slot extraction (externally
    /// supplied slot values win), FAQ routing, and query-level domain tags.
    pub fn classify(&self, query: &str, supplied: SlotValues) -> QueryContext {
        let normalized = normalize_text(query);
        let slots = supplied.merged_over(extract_slots(&normalized));
        let faq_hit = self
            .rules
            .faq
            .match_query(&normalized)
            .map(str::to_string);
        let domains = extract_domains(&normalized);

        QueryContext {
            slots,
            faq_hit,
            model_compare: looks_like_model_compare(&normalized),
            domains,
        }
    }

    /// The single synchronous decision boundary: rank the candidates, pick
    /// exactly one answer mode, apply the high-risk override, and gate the
    /// product card.
    pub fn decide(&self, ctx: &QueryContext, candidates: &[Document]) -> Decision {
        let started = Instant::now();
        let trace_id = Uuid::new_v4();
        self.metrics.inc_decision();

        let resolution = match resolve(candidates, &self.rules.table, &self.rules.policy) {
            Ok(resolution) => resolution,
            Err(ResolveError::UnresolvedConflict { unranked }) => {
                // A FAQ hit bypasses retrieval ranking entirely; the matched
                // entry is registered in the table even when no candidate is.
                if ctx.faq_hit.is_some() {
                    debug!(
                        %trace_id,
                        ?unranked,
                        "unranked candidates ignored in favor of the faq hit"
                    );
                    None
                } else {
                    self.metrics.inc_unresolved_conflict();
                    warn!(
                        %trace_id,
                        ?unranked,
                        "no candidate is ranked by the priority table; refusing instead of merging"
                    );
                    let domains = union_domains(ctx, None);
                    return self.finish(
                        trace_id,
                        started,
                        ctx,
                        AnswerMode::Refusal,
                        Some(UNRANKED_CONFLICT_REASON.to_string()),
                        Vec::new(),
                        &domains,
                    );
                }
            }
        };

        if let Some(resolution) = &resolution {
            if !resolution.suppressed_tiers.is_empty() {
                debug!(
                    %trace_id,
                    tier = resolution.tier,
                    suppressed = ?resolution.suppressed_tiers,
                    "lower-tier candidates suppressed"
                );
            }
            if resolution.tie_broken {
                self.record_tension(trace_id, resolution);
            }
        }

        let domains = union_domains(ctx, resolution.as_ref());
        let selection = select_mode(ctx, resolution.as_ref(), &domains, &self.rules.policy);
        let permitted = permitted_documents(ctx, resolution.as_ref(), selection.mode);

        self.finish(
            trace_id,
            started,
            ctx,
            selection.mode,
            selection.reason,
            permitted,
            &domains,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        trace_id: Uuid,
        started: Instant,
        ctx: &QueryContext,
        mode: AnswerMode,
        reason: Option<String>,
        permitted: Vec<Document>,
        domains: &[String],
    ) -> Decision {
        let guard = apply_high_risk_guard(mode, reason, domains, &self.rules.policy);
        // The guard can only tighten the decision; a downgrade drops the
        // documents that were permitted for the recommendation.
        let permitted = if guard.mode == mode {
            permitted
        } else {
            match guard.mode {
                AnswerMode::Refusal => Vec::new(),
                _ => permitted,
            }
        };

        let conditions_complete = ctx.conditions_complete();
        let decision = Decision {
            mode: guard.mode,
            show_product_card: show_product_card(guard.mode, conditions_complete),
            disclaimer_required: guard.disclaimer_required,
            reason: guard.reason,
            missing_slots: ctx.slots.missing(),
            permitted_documents: permitted,
        };

        self.count_mode(decision.mode);
        self.metrics.observe_latency(started.elapsed());
        info!(
            %trace_id,
            mode = decision.mode.as_str(),
            permitted = decision.permitted_documents.len(),
            show_product_card = decision.show_product_card,
            disclaimer = decision.disclaimer_required,
            high_risk = ?guard.triggered,
            "decision made"
        );

        decision
    }

    fn record_tension(&self, trace_id: Uuid, resolution: &Resolution) {
        let event = PolicyTension {
            trace_id,
            tier: resolution.tier,
            document_ids: resolution
                .permitted
                .iter()
                .map(|doc| doc.id.clone())
                .collect(),
        };
        warn!(
            %trace_id,
            tier = event.tier,
            documents = ?event.document_ids,
            "same-tier tie resolved by document-id order"
        );
        self.metrics.inc_policy_tension();
        self.tensions.write().push(event);
    }

    fn count_mode(&self, mode: AnswerMode) {
        match mode {
            AnswerMode::FaqHit => self.metrics.inc_faq_hit(),
            AnswerMode::AskClarifying => self.metrics.inc_clarification(),
            AnswerMode::SuggestRange => self.metrics.inc_recommendation(),
            AnswerMode::Explanation => self.metrics.inc_explanation(),
            AnswerMode::Refusal => self.metrics.inc_refusal(),
        }
    }
}

fn union_domains(ctx: &QueryContext, resolution: Option<&Resolution>) -> Vec<String> {
    let mut domains = ctx.domains.clone();
    if let Some(resolution) = resolution {
        for doc in &resolution.permitted {
            for domain in &doc.domains {
                if !domains.contains(domain) {
                    domains.push(domain.clone());
                }
            }
        }
    }
    domains.sort();
    domains
}

/// Which documents the generator may actually use. Clarifications and
/// refusals permit nothing; a FAQ hit permits exactly the matched entry.
fn permitted_documents(
    ctx: &QueryContext,
    resolution: Option<&Resolution>,
    mode: AnswerMode,
) -> Vec<Document> {
    match mode {
        AnswerMode::AskClarifying | AnswerMode::Refusal => Vec::new(),
        AnswerMode::FaqHit => {
            let Some(hit) = ctx.faq_hit.as_deref() else {
                return Vec::new();
            };
            if let Some(resolution) = resolution {
                if let Some(doc) = resolution.permitted.iter().find(|doc| doc.id == hit) {
                    return vec![doc.clone()];
                }
            }
            // The curated entry is registered in the table even when the
            // retriever did not return it as a candidate.
            vec![Document::new(hit, "faq")]
        }
        AnswerMode::SuggestRange | AnswerMode::Explanation => resolution
            .map(|resolution| resolution.permitted.clone())
            .unwrap_or_default(),
    }
}
