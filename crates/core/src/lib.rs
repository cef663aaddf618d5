pub mod faq;
pub mod guard;
pub mod models;
pub mod resolver;
pub mod selector;
pub mod slots;
pub mod terms;

pub use faq::{FaqRouter, FaqRule};
pub use guard::{apply_high_risk_guard, GuardOutcome};
pub use models::*;
pub use resolver::{resolve, ResolveError, Resolution};
pub use selector::{select_mode, show_product_card, Selection};
pub use slots::{
    extract_domains, extract_model_tokens, extract_slots, looks_like_model_compare,
    normalize_text,
};
pub use terms::build_retrieval_terms;
