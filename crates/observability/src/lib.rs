use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Counters for the governance pipeline, one instance shared per process.
#[derive(Debug, Default)]
pub struct DecisionMetrics {
    decisions_total: AtomicU64,
    faq_hits_total: AtomicU64,
    clarifications_total: AtomicU64,
    recommendations_total: AtomicU64,
    explanations_total: AtomicU64,
    refusals_total: AtomicU64,
    policy_tensions_total: AtomicU64,
    unresolved_conflicts_total: AtomicU64,
    total_latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub decisions_total: u64,
    pub faq_hits_total: u64,
    pub clarifications_total: u64,
    pub recommendations_total: u64,
    pub explanations_total: u64,
    pub refusals_total: u64,
    pub policy_tensions_total: u64,
    pub unresolved_conflicts_total: u64,
    pub avg_latency_micros: f64,
}

impl DecisionMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_decision(&self) {
        self.decisions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_faq_hit(&self) {
        self.faq_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_clarification(&self) {
        self.clarifications_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_recommendation(&self) {
        self.recommendations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_explanation(&self) {
        self.explanations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_refusal(&self) {
        self.refusals_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_policy_tension(&self) {
        self.policy_tensions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unresolved_conflict(&self) {
        self.unresolved_conflicts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let decisions = self.decisions_total.load(Ordering::Relaxed);
        let latency = self.total_latency_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            decisions_total: decisions,
            faq_hits_total: self.faq_hits_total.load(Ordering::Relaxed),
            clarifications_total: self.clarifications_total.load(Ordering::Relaxed),
            recommendations_total: self.recommendations_total.load(Ordering::Relaxed),
            explanations_total: self.explanations_total.load(Ordering::Relaxed),
            refusals_total: self.refusals_total.load(Ordering::Relaxed),
            policy_tensions_total: self.policy_tensions_total.load(Ordering::Relaxed),
            unresolved_conflicts_total: self.unresolved_conflicts_total.load(Ordering::Relaxed),
            avg_latency_micros: if decisions == 0 {
                0.0
            } else {
                latency as f64 / decisions as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}=info,lumen_engine=info", service_name))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
