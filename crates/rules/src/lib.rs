//! Loader for the tiered governance rules file.
//!
//! The format is a small, human-edited text with three sections:
//!
//! ```text
//! [tiers]
//! 3 = faq_uvc_metrics, faq_sales_scope
//! 2 = product_index, product_sri_4000uvc
//! 1 = blog_uv_basics
//!
//! [policy]
//! index_document = product_index
//! faq_tier = 3
//! cross_tier_synthesis = forbid
//! high_risk_domains = medical, uvc
//! domain.medical.refuse = true
//!
//! [faq]
//! faq_sales_scope = (?i)(price|quote|stock|lead time)
//! ```
//!
//! Loading is eager and all-or-nothing: any malformed line, duplicate
//! document id, or missing index document is fatal and the service must not
//! start. Once loaded the [`RuleSet`] is immutable and shared read-only.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;

use lumen_core::{
    DomainPolicy, FaqRouter, FaqRule, GlobalPolicy, PriorityTable, PriorityTableError,
};

/// Everything the decision pipeline needs, built once at process start.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub table: PriorityTable,
    pub policy: GlobalPolicy,
    pub faq: FaqRouter,
}

#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error(transparent)]
    Table(#[from] PriorityTableError),
    #[error("missing required policy key '{key}'")]
    MissingKey { key: &'static str },
    #[error("index document '{id}' is not in the top non-faq tier {tier}")]
    MissingIndexDocument { id: String, tier: u32 },
    #[error("faq pattern '{id}' does not name a document in the faq tier")]
    UnknownFaqDocument { id: String },
    #[error("faq pattern '{id}' does not compile: {source}")]
    BadFaqPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("domain '{domain}' has overrides but is not listed in high_risk_domains")]
    UnknownDomain { domain: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Tiers,
    Policy,
    Faq,
}

/// Parse the rules text into a validated [`RuleSet`].
pub fn parse_rules(text: &str) -> Result<RuleSet, RuleLoadError> {
    let mut section = Section::None;
    let mut tier_entries: Vec<(u32, Vec<String>)> = Vec::new();
    let mut policy_kv: Vec<(usize, String, String)> = Vec::new();
    let mut faq_kv: Vec<(String, String)> = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "[tiers]" => {
                section = Section::Tiers;
                continue;
            }
            "[policy]" => {
                section = Section::Policy;
                continue;
            }
            "[faq]" => {
                section = Section::Faq;
                continue;
            }
            _ if line.starts_with('[') => {
                return Err(RuleLoadError::Malformed {
                    line: line_no,
                    message: format!("unknown section {line}"),
                });
            }
            _ => {}
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(RuleLoadError::Malformed {
                line: line_no,
                message: "expected 'key = value'".to_string(),
            });
        };
        let key = key.trim();
        let value = value.trim();

        match section {
            Section::None => {
                return Err(RuleLoadError::Malformed {
                    line: line_no,
                    message: "entry before any [section] header".to_string(),
                });
            }
            Section::Tiers => {
                let tier: u32 = key.parse().map_err(|_| RuleLoadError::Malformed {
                    line: line_no,
                    message: format!("tier number expected, got '{key}'"),
                })?;
                let ids = split_list(value);
                if ids.is_empty() {
                    return Err(RuleLoadError::Malformed {
                        line: line_no,
                        message: format!("tier {tier} lists no documents"),
                    });
                }
                tier_entries.push((tier, ids));
            }
            Section::Policy => {
                policy_kv.push((line_no, key.to_string(), value.to_string()));
            }
            Section::Faq => {
                faq_kv.push((key.to_string(), value.to_string()));
            }
        }
    }

    let faq_tier = policy_value(&policy_kv, "faq_tier")
        .map(|(line_no, value)| {
            value.parse::<u32>().map_err(|_| RuleLoadError::Malformed {
                line: line_no,
                message: format!("faq_tier must be a tier number, got '{value}'"),
            })
        })
        .transpose()?;

    let table = PriorityTable::from_entries(&tier_entries, faq_tier)?;
    let policy = build_policy(&policy_kv, &table)?;
    let faq = build_faq(&faq_kv, &table)?;

    Ok(RuleSet { table, policy, faq })
}

/// Read and parse a rules file; the typical startup path.
pub fn load_rules(path: impl AsRef<Path>) -> Result<RuleSet> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed reading rules file: {}", path.display()))?;
    let rules = parse_rules(&text)
        .with_context(|| format!("invalid rules file: {}", path.display()))?;
    Ok(rules)
}

fn build_policy(
    kv: &[(usize, String, String)],
    table: &PriorityTable,
) -> Result<GlobalPolicy, RuleLoadError> {
    let index_document = policy_value(kv, "index_document")
        .map(|(_, value)| value)
        .ok_or(RuleLoadError::MissingKey {
            key: "index_document",
        })?;

    // The index document anchors the top tier of ordinary documentation; the
    // FAQ tier sits above it but is not where the index lives.
    let index_tier = top_non_faq_tier(table);
    let in_tier = table
        .tier_members(index_tier)
        .map(|members| members.contains(&index_document))
        .unwrap_or(false);
    if !in_tier {
        return Err(RuleLoadError::MissingIndexDocument {
            id: index_document,
            tier: index_tier,
        });
    }

    let mut high_risk: BTreeMap<String, DomainPolicy> = BTreeMap::new();
    if let Some((_, domains)) = policy_value_ref(kv, "high_risk_domains") {
        for domain in split_list(domains) {
            high_risk.insert(domain, DomainPolicy::default());
        }
    }

    let mut forbid_cross_tier_synthesis = true;

    for (line_no, key, value) in kv {
        match key.as_str() {
            "index_document" | "faq_tier" | "high_risk_domains" => {}
            "governance_precedence" => {
                // Tier ordering enforces precedence structurally; the key is
                // accepted but cannot turn it off.
                if !parse_bool(*line_no, key, value)? {
                    return Err(RuleLoadError::Malformed {
                        line: *line_no,
                        message: "governance_precedence cannot be disabled".to_string(),
                    });
                }
            }
            "cross_tier_synthesis" => {
                forbid_cross_tier_synthesis = match value.as_str() {
                    "forbid" => true,
                    other => {
                        return Err(RuleLoadError::Malformed {
                            line: *line_no,
                            message: format!(
                                "cross_tier_synthesis only supports 'forbid', got '{other}'"
                            ),
                        });
                    }
                };
            }
            key if key.starts_with("domain.") => {
                let mut parts = key.splitn(3, '.');
                let (_, domain, field) = (parts.next(), parts.next(), parts.next());
                let (Some(domain), Some(field)) = (domain, field) else {
                    return Err(RuleLoadError::Malformed {
                        line: *line_no,
                        message: format!("expected domain.<name>.<field>, got '{key}'"),
                    });
                };
                let rule =
                    high_risk
                        .get_mut(domain)
                        .ok_or_else(|| RuleLoadError::UnknownDomain {
                            domain: domain.to_string(),
                        })?;
                let flag = parse_bool(*line_no, key, value)?;
                match field {
                    "allow_recommendation" => rule.allow_recommendation = flag,
                    "disclaimer_required" => rule.disclaimer_required = flag,
                    "refuse" => rule.refuse = flag,
                    other => {
                        return Err(RuleLoadError::Malformed {
                            line: *line_no,
                            message: format!("unknown domain field '{other}'"),
                        });
                    }
                }
            }
            other => {
                return Err(RuleLoadError::Malformed {
                    line: *line_no,
                    message: format!("unknown policy key '{other}'"),
                });
            }
        }
    }

    Ok(GlobalPolicy {
        forbid_cross_tier_synthesis,
        index_document,
        high_risk,
    })
}

fn build_faq(kv: &[(String, String)], table: &PriorityTable) -> Result<FaqRouter, RuleLoadError> {
    let faq_members = table.tier_members(table.faq_tier());

    let mut rules = Vec::with_capacity(kv.len());
    for (doc_id, pattern) in kv {
        let registered = faq_members
            .map(|members| members.contains(doc_id))
            .unwrap_or(false);
        if !registered {
            return Err(RuleLoadError::UnknownFaqDocument { id: doc_id.clone() });
        }
        let pattern = Regex::new(pattern).map_err(|source| RuleLoadError::BadFaqPattern {
            id: doc_id.clone(),
            source,
        })?;
        rules.push(FaqRule {
            doc_id: doc_id.clone(),
            pattern,
        });
    }

    Ok(FaqRouter::new(rules))
}

fn top_non_faq_tier(table: &PriorityTable) -> u32 {
    let top = table.top_tier();
    if !table.is_faq_tier(top) {
        return top;
    }
    // Walk down from the top until a non-FAQ tier with members is found.
    (1..top)
        .rev()
        .find(|tier| table.tier_members(*tier).is_some())
        .unwrap_or(top)
}

fn policy_value(kv: &[(usize, String, String)], wanted: &str) -> Option<(usize, String)> {
    kv.iter()
        .find(|(_, key, _)| key == wanted)
        .map(|(line, _, value)| (*line, value.clone()))
}

fn policy_value_ref<'a>(
    kv: &'a [(usize, String, String)],
    wanted: &str,
) -> Option<(usize, &'a str)> {
    kv.iter()
        .find(|(_, key, _)| key == wanted)
        .map(|(line, _, value)| (*line, value.as_str()))
}

fn parse_bool(line: usize, key: &str, value: &str) -> Result<bool, RuleLoadError> {
    match value {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        other => Err(RuleLoadError::Malformed {
            line,
            message: format!("{key} expects true/false, got '{other}'"),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}
