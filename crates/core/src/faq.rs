use regex::Regex;

/// One curated FAQ entry: an exact-match pattern routed to the FAQ-tier
/// document that answers it. Patterns are ordered; the first hit wins.
#[derive(Debug, Clone)]
pub struct FaqRule {
    pub doc_id: String,
    pub pattern: Regex,
}

#[derive(Debug, Clone, Default)]
pub struct FaqRouter {
    rules: Vec<FaqRule>,
}

impl FaqRouter {
    pub fn new(rules: Vec<FaqRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FaqRule] {
        &self.rules
    }

    /// Id of the FAQ document matching this query, if any. A hit here
    /// short-circuits retrieval ranking entirely.
    pub fn match_query(&self, text: &str) -> Option<&str> {
        let trimmed = text.trim();
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(trimmed))
            .map(|rule| rule.doc_id.as_str())
    }
}
