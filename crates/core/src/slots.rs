use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::SlotValues;

static MODEL_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z]+-?\d{2,}[A-Za-z0-9-]*\b").expect("valid model token regex")
});

static WAVELENGTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{2,4})\s*nm\b").expect("valid wavelength regex"));

static UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(lux|lx|nits?|cd/m\^?2|w/m\^?2|[muµ]w/cm\^?2|[uµ]mol/m\^?2/s|lumens?|lm)\b",
    )
    .expect("valid unit regex")
});

static VS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(vs\.?|versus)\b").expect("valid comparison regex"));

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Product model numbers mentioned in the query, deduplicated, input order.
pub fn extract_model_tokens(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for token in MODEL_TOKEN_RE.find_iter(text) {
        let token = token.as_str().to_string();
        if !seen
            .iter()
            .any(|existing: &String| existing.eq_ignore_ascii_case(&token))
        {
            seen.push(token);
        }
    }
    seen
}

/// Two explicit models, or one model next to "vs"/comparison wording: the
/// query is a spec comparison and skips the slot-gated recommendation flow.
pub fn looks_like_model_compare(text: &str) -> bool {
    let models = extract_model_tokens(text);
    if models.len() >= 2 {
        return true;
    }
    if models.is_empty() {
        return false;
    }
    VS_RE.is_match(text) || contains_any(&text.to_lowercase(), &["compare", "difference between"])
}

/// Keyword classification of the three required slots. External NLP may
/// overwrite any of these through [`SlotValues::merged_over`].
pub fn extract_slots(text: &str) -> SlotValues {
    let lower = text.to_lowercase();
    let mut slots = SlotValues::default();

    if let Some(metric) = classify_metric(&lower) {
        slots.measurement_metric = Some(metric.to_string());
    }
    if let Some(object) = classify_object(&lower) {
        slots.measurement_object = Some(object.to_string());
    } else if let Some(model) = extract_model_tokens(text).into_iter().next() {
        slots.measurement_object = Some(model);
    }
    if let Some(context) = classify_context(&lower) {
        slots.usage_context = Some(context.to_string());
    }

    slots
}

/// Domain tags recognizable from the query text alone. Tags carried by
/// matched documents are unioned in later.
pub fn extract_domains(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut domains = Vec::new();

    if contains_any(&lower, &["uvc", "germicidal", "disinfection", "254nm", "275nm"]) {
        domains.push("uvc".to_string());
    }
    if contains_any(
        &lower,
        &["medical", "phototherapy", "surgical", "clinical", "patient"],
    ) {
        domains.push("medical".to_string());
    }
    if contains_any(&lower, &["plant", "grow light", "horticult", "ppfd", "ppf"]) {
        domains.push("plant".to_string());
    }

    domains
}

fn classify_metric(lower: &str) -> Option<&'static str> {
    if contains_any(lower, &["spectrum", "spectral", "wavelength distribution"]) {
        return Some("spectrum");
    }
    if contains_any(lower, &["luminance", "brightness", "nit", "cd/m2", "cd/m^2"]) {
        return Some("luminance");
    }
    if contains_any(lower, &["irradiance", "radiometer", "w/cm2", "w/m2", "dose"]) {
        return Some("irradiance");
    }
    if contains_any(lower, &["ppfd", "ppf", "photon flux", "par meter"]) {
        return Some("photon_flux");
    }
    if contains_any(lower, &["luminous flux", "total flux", "integrating sphere", "lumen"]) {
        return Some("luminous_flux");
    }
    if contains_any(lower, &["illuminance", "lux", " lx"]) {
        return Some("illuminance");
    }
    if contains_any(lower, &["reflectance", "transmittance", "reflectivity"]) {
        return Some("reflectance");
    }
    if UNIT_RE.is_match(lower) || WAVELENGTH_RE.is_match(lower) {
        // A bare unit or wavelength still pins down what is being measured.
        return Some("spectrum");
    }
    None
}

fn classify_object(lower: &str) -> Option<&'static str> {
    if contains_any(lower, &["uvc led", "uv lamp", "germicidal lamp", "uvc source"]) {
        return Some("uvc_source");
    }
    if contains_any(lower, &["medical lamp", "phototherapy", "surgical light"]) {
        return Some("medical_lamp");
    }
    if contains_any(lower, &["plant light", "grow light", "horticulture fixture"]) {
        return Some("plant_light");
    }
    if contains_any(lower, &["display", "monitor", "backlight", "panel", "screen"]) {
        return Some("display");
    }
    if contains_any(lower, &["vcsel", "laser"]) {
        return Some("laser");
    }
    if contains_any(lower, &["phosphor"]) {
        return Some("phosphor");
    }
    if contains_any(lower, &["glass", "mirror", "coating", "film"]) {
        return Some("surface");
    }
    if contains_any(lower, &["led"]) {
        return Some("led");
    }
    None
}

fn classify_context(lower: &str) -> Option<&'static str> {
    if contains_any(
        lower,
        &["production line", "assembly line", "incoming inspection", "qc", "quality control"],
    ) {
        return Some("production_qc");
    }
    if contains_any(lower, &["r&d", "research", "laboratory", "lab bench", "development"]) {
        return Some("rnd_lab");
    }
    if contains_any(lower, &["field", "on-site", "portable", "handheld", "quick check"]) {
        return Some("field_quick");
    }
    if contains_any(lower, &["calibration", "traceab", "certif"]) {
        return Some("calibration");
    }
    None
}

pub(crate) fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}

pub(crate) fn wavelengths(text: &str) -> Vec<String> {
    WAVELENGTH_RE
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|nm| format!("{}nm", nm.as_str()))
        .collect()
}

pub(crate) fn units(text: &str) -> Vec<String> {
    UNIT_RE
        .find_iter(text)
        .map(|unit| unit.as_str().to_lowercase())
        .collect()
}
