use serde::Serialize;
use thiserror::Error;

use crate::models::{Document, GlobalPolicy, PriorityTable};

/// Output of priority resolution: the candidates restricted to the single
/// highest tier present, in the documented deterministic order.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub tier: u32,
    pub permitted: Vec<Document>,
    /// Lower tiers that also had candidates and were dropped, highest first.
    pub suppressed_tiers: Vec<u32>,
    /// More than one document survived in the winning tier; the tie-break
    /// ordering was applied. Recoverable, but worth a policy-tension log.
    pub tie_broken: bool,
    pub from_faq_tier: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// None of the candidates is registered in the priority table, so any
    /// answer would synthesize content the table cannot rank. Per policy this
    /// is signalled, never merged.
    #[error("no candidate is registered in the priority table; cannot rank {unranked:?}")]
    UnresolvedConflict { unranked: Vec<String> },
}

/// Restrict `candidates` to the highest tier present among them.
///
/// Unranked candidates (ids unknown to the table) are dropped; if *all*
/// candidates are unranked that is an unresolved conflict. Within the winning
/// tier documents are ordered by id ascending and deduplicated — the total,
/// deterministic tie-break. An empty candidate set resolves to `None`.
pub fn resolve(
    candidates: &[Document],
    table: &PriorityTable,
    policy: &GlobalPolicy,
) -> Result<Option<Resolution>, ResolveError> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut ranked: Vec<(u32, &Document)> = Vec::new();
    let mut unranked: Vec<String> = Vec::new();
    for doc in candidates {
        match table.tier_of(&doc.id) {
            Some(tier) => ranked.push((tier, doc)),
            None => unranked.push(doc.id.clone()),
        }
    }

    if ranked.is_empty() {
        if policy.forbid_cross_tier_synthesis {
            unranked.sort();
            unranked.dedup();
            return Err(ResolveError::UnresolvedConflict { unranked });
        }
        return Ok(None);
    }

    let Some(winning_tier) = ranked.iter().map(|(tier, _)| *tier).max() else {
        return Ok(None);
    };

    let mut suppressed_tiers: Vec<u32> = ranked
        .iter()
        .map(|(tier, _)| *tier)
        .filter(|tier| *tier != winning_tier)
        .collect();
    suppressed_tiers.sort_unstable_by(|a, b| b.cmp(a));
    suppressed_tiers.dedup();

    let mut permitted: Vec<Document> = ranked
        .into_iter()
        .filter(|(tier, _)| *tier == winning_tier)
        .map(|(_, doc)| doc.clone())
        .collect();
    permitted.sort_by(|a, b| a.id.cmp(&b.id));
    permitted.dedup_by(|a, b| a.id == b.id);

    let tie_broken = permitted.len() > 1;

    Ok(Some(Resolution {
        tier: winning_tier,
        permitted,
        suppressed_tiers,
        tie_broken,
        from_faq_tier: table.is_faq_tier(winning_tier),
    }))
}
