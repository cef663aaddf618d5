use crate::models::QueryContext;
use crate::slots::{contains_any, units, wavelengths};

const MAX_TERMS: usize = 12;

/// Domain vocabulary that reliably improves retrieval hit rate for product
/// documentation. Checked against the raw query, not the slot values.
const VOCAB: &[&str] = &[
    "UVC",
    "UVB",
    "UVA",
    "VIS",
    "NIR",
    "PPFD",
    "PPF",
    "PAR",
    "irradiance",
    "radiometer",
    "illuminance",
    "lux",
    "luminance",
    "spectrum",
    "spectrometer",
    "integrating sphere",
    "luminous flux",
    "lumen",
    "reflectance",
    "transmittance",
    "phosphor",
    "LED",
    "laser",
    "display",
];

/// Turn a classified query into retrieval terms for the external retriever:
/// vocabulary hits, wavelengths, units, slot values, then the raw query as a
/// catch-all. Deduplicated case-insensitively, capped.
pub fn build_retrieval_terms(ctx: &QueryContext, raw_query: &str) -> Vec<String> {
    let lower = raw_query.to_lowercase();
    let mut terms: Vec<String> = Vec::new();

    for word in VOCAB {
        if lower.contains(&word.to_lowercase()) {
            push_unique(&mut terms, word);
        }
    }

    for nm in wavelengths(raw_query).into_iter().take(6) {
        push_unique(&mut terms, &nm);
    }
    for unit in units(raw_query).into_iter().take(6) {
        push_unique(&mut terms, &unit);
    }

    // Combined terms recover queries where single tokens rank too broadly.
    if contains_any(&lower, &["uvc", "uvb", "uva"])
        && contains_any(&lower, &["irradiance", "intensity", "dose"])
    {
        push_unique(&mut terms, "UVC irradiance");
    }
    if contains_any(&lower, &["ppfd", "ppf", "plant", "grow"]) {
        push_unique(&mut terms, "PPFD horticulture");
    }

    for value in [
        ctx.slots.measurement_metric.as_deref(),
        ctx.slots.measurement_object.as_deref(),
        ctx.slots.usage_context.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        push_unique(&mut terms, value);
    }

    let summary = raw_query.split_whitespace().collect::<Vec<_>>().join(" ");
    if !summary.is_empty() {
        push_unique(&mut terms, &summary);
    }

    terms.truncate(MAX_TERMS);
    terms
}

fn push_unique(terms: &mut Vec<String>, candidate: &str) {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return;
    }
    if terms
        .iter()
        .any(|existing| existing.eq_ignore_ascii_case(candidate))
    {
        return;
    }
    terms.push(candidate.to_string());
}
