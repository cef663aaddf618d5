use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A candidate document as handed over by the external retriever. The tier is
/// not carried on the document itself; it is looked up in the [`PriorityTable`]
/// at resolution time so retrieval output cannot smuggle in a rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub domains: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            domains: Vec::new(),
        }
    }

    pub fn with_domains(mut self, domains: &[&str]) -> Self {
        self.domains = domains.iter().map(|d| (*d).to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PriorityTableError {
    #[error("priority table has no tiers")]
    Empty,
    #[error("tier numbers must be positive, got 0")]
    ZeroTier,
    #[error("document '{id}' appears in tier {first} and tier {second}")]
    DuplicateDocument { id: String, first: u32, second: u32 },
    #[error("faq tier {tier} is not declared in the tier table")]
    UnknownFaqTier { tier: u32 },
}

/// Tier -> document-id mapping, built once at load and never mutated.
/// Larger tier numbers take precedence over smaller ones.
#[derive(Debug, Clone)]
pub struct PriorityTable {
    tiers: BTreeMap<u32, BTreeSet<String>>,
    by_doc: HashMap<String, u32>,
    faq_tier: u32,
}

impl PriorityTable {
    /// `faq_tier` defaults to the top tier when not given.
    pub fn from_entries(
        entries: &[(u32, Vec<String>)],
        faq_tier: Option<u32>,
    ) -> Result<Self, PriorityTableError> {
        if entries.is_empty() {
            return Err(PriorityTableError::Empty);
        }

        let mut tiers: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
        let mut by_doc: HashMap<String, u32> = HashMap::new();

        for (tier, ids) in entries {
            if *tier == 0 {
                return Err(PriorityTableError::ZeroTier);
            }
            let bucket = tiers.entry(*tier).or_default();
            for id in ids {
                if let Some(first) = by_doc.get(id) {
                    if *first != *tier {
                        return Err(PriorityTableError::DuplicateDocument {
                            id: id.clone(),
                            first: *first,
                            second: *tier,
                        });
                    }
                    continue;
                }
                by_doc.insert(id.clone(), *tier);
                bucket.insert(id.clone());
            }
        }

        let top = tiers
            .keys()
            .next_back()
            .copied()
            .ok_or(PriorityTableError::Empty)?;
        let faq_tier = faq_tier.unwrap_or(top);
        if !tiers.contains_key(&faq_tier) {
            return Err(PriorityTableError::UnknownFaqTier { tier: faq_tier });
        }

        Ok(Self {
            tiers,
            by_doc,
            faq_tier,
        })
    }

    pub fn tier_of(&self, doc_id: &str) -> Option<u32> {
        self.by_doc.get(doc_id).copied()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.by_doc.contains_key(doc_id)
    }

    pub fn top_tier(&self) -> u32 {
        // Construction guarantees at least one tier.
        self.tiers
            .keys()
            .next_back()
            .copied()
            .unwrap_or(self.faq_tier)
    }

    pub fn faq_tier(&self) -> u32 {
        self.faq_tier
    }

    pub fn is_faq_tier(&self, tier: u32) -> bool {
        tier == self.faq_tier
    }

    pub fn tier_members(&self, tier: u32) -> Option<&BTreeSet<String>> {
        self.tiers.get(&tier)
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    pub fn document_count(&self) -> usize {
        self.by_doc.len()
    }
}

/// Per-domain override for subject areas where recommendations are risky.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainPolicy {
    pub allow_recommendation: bool,
    pub disclaimer_required: bool,
    /// When true the query is refused outright instead of being answered in
    /// explanation mode.
    pub refuse: bool,
}

impl Default for DomainPolicy {
    fn default() -> Self {
        Self {
            allow_recommendation: false,
            disclaimer_required: true,
            refuse: false,
        }
    }
}

/// Process-wide policy flags, immutable after load. Governance precedence is
/// not a flag here: tier ordering enforces it structurally, and the loader
/// rejects any attempt to disable it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalPolicy {
    /// Generation may never combine content across priority tiers.
    pub forbid_cross_tier_synthesis: bool,
    /// Document id that must live in the top non-FAQ tier; missing it is a
    /// load error.
    pub index_document: String,
    pub high_risk: BTreeMap<String, DomainPolicy>,
}

impl GlobalPolicy {
    pub fn is_high_risk(&self, domain: &str) -> bool {
        self.high_risk.contains_key(domain)
    }

    pub fn domain_policy(&self, domain: &str) -> Option<&DomainPolicy> {
        self.high_risk.get(domain)
    }
}

/// The three classification slots that must be filled before any product
/// recommendation may be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    MeasurementObject,
    MeasurementMetric,
    UsageContext,
}

impl SlotKind {
    pub const ALL: [SlotKind; 3] = [
        SlotKind::MeasurementObject,
        SlotKind::MeasurementMetric,
        SlotKind::UsageContext,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SlotKind::MeasurementObject => "measurement_object",
            SlotKind::MeasurementMetric => "measurement_metric",
            SlotKind::UsageContext => "usage_context",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotValues {
    pub measurement_object: Option<String>,
    pub measurement_metric: Option<String>,
    pub usage_context: Option<String>,
}

impl SlotValues {
    pub fn get(&self, kind: SlotKind) -> Option<&str> {
        match kind {
            SlotKind::MeasurementObject => self.measurement_object.as_deref(),
            SlotKind::MeasurementMetric => self.measurement_metric.as_deref(),
            SlotKind::UsageContext => self.usage_context.as_deref(),
        }
    }

    pub fn set(&mut self, kind: SlotKind, value: impl Into<String>) {
        let value = Some(value.into());
        match kind {
            SlotKind::MeasurementObject => self.measurement_object = value,
            SlotKind::MeasurementMetric => self.measurement_metric = value,
            SlotKind::UsageContext => self.usage_context = value,
        }
    }

    /// Externally supplied slot values win over keyword-extracted ones.
    pub fn merged_over(mut self, extracted: SlotValues) -> SlotValues {
        if self.measurement_object.is_none() {
            self.measurement_object = extracted.measurement_object;
        }
        if self.measurement_metric.is_none() {
            self.measurement_metric = extracted.measurement_metric;
        }
        if self.usage_context.is_none() {
            self.usage_context = extracted.usage_context;
        }
        self
    }

    pub fn missing(&self) -> Vec<SlotKind> {
        SlotKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Per-request classification result. Created once per query, discarded after
/// the external generator consumes the decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    pub slots: SlotValues,
    /// Id of the FAQ document matched exactly, when any.
    pub faq_hit: Option<String>,
    /// The query compares explicit product models; it is answered in
    /// explanation mode instead of the slot-gated recommendation flow.
    #[serde(default)]
    pub model_compare: bool,
    /// Domain tags resolved from the query and matched documents.
    pub domains: Vec<String>,
}

impl QueryContext {
    pub fn conditions_complete(&self) -> bool {
        self.slots.is_complete()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    FaqHit,
    AskClarifying,
    SuggestRange,
    Explanation,
    Refusal,
}

impl AnswerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerMode::FaqHit => "faq_hit",
            AnswerMode::AskClarifying => "ask_clarifying",
            AnswerMode::SuggestRange => "suggest_range",
            AnswerMode::Explanation => "explanation",
            AnswerMode::Refusal => "refusal",
        }
    }
}

/// What the external generator/renderer is allowed to do for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub mode: AnswerMode,
    pub permitted_documents: Vec<Document>,
    pub show_product_card: bool,
    pub disclaimer_required: bool,
    /// Populated only for refusals.
    pub reason: Option<String>,
    /// Which slots the renderer should ask for in clarification mode. The
    /// core never phrases the question itself.
    pub missing_slots: Vec<SlotKind>,
}
