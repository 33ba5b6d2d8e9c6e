//! Token usage and savings tracking.
//!
//! The [`UsageTracker`] records what each assembled window actually cost
//! against what the naive send-everything strategy would have cost for that
//! tier. It is strictly observational: nothing in the pipeline reads it
//! back to make decisions, so removing it changes no window. Counters only
//! ever grow.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokengate_config::Baselines;
use tokengate_core::{QueryKind, SessionId};

/// What one recorded query looked like against its baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub session_id: SessionId,
    pub kind: QueryKind,
    /// Tokens the assembled window actually used.
    pub actual_tokens: usize,
    /// What the naive strategy would have sent for this tier.
    pub baseline_tokens: usize,
    /// Baseline minus actual, floored at zero.
    pub saved_tokens: usize,
    /// Percentage of the baseline saved.
    pub reduction_pct: f64,
    /// Session statistics after this query.
    pub session: SessionStats,
}

/// Accumulated statistics for one session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub queries: u64,
    pub simple: u64,
    pub medium: u64,
    pub complex: u64,
    pub escalated: u64,
    /// Queries answered on a degraded path.
    pub fallback: u64,
    pub actual_tokens: u64,
    pub baseline_tokens: u64,
    pub saved_tokens: u64,
    /// Largest single-query saving seen.
    pub peak_savings: u64,
    /// Saved as a percentage of baseline, across the whole session.
    pub average_reduction: f64,
}

/// Accumulated statistics across all sessions. Monotone.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GlobalTotals {
    pub queries: u64,
    pub actual_tokens: u64,
    pub baseline_tokens: u64,
    pub saved_tokens: u64,
}

#[derive(Default)]
struct TrackerState {
    sessions: HashMap<SessionId, SessionStats>,
    totals: GlobalTotals,
}

/// Thread-safe usage tracker.
pub struct UsageTracker {
    baselines: Baselines,
    state: RwLock<TrackerState>,
}

impl UsageTracker {
    pub fn new(baselines: Baselines) -> Self {
        Self {
            baselines,
            state: RwLock::new(TrackerState::default()),
        }
    }

    /// Record one assembled window and return the updated report.
    pub fn record(
        &self,
        session_id: &SessionId,
        kind: QueryKind,
        fallback: bool,
        actual_tokens: usize,
    ) -> UsageReport {
        let baseline_tokens = self.baselines.for_kind(kind);
        let saved_tokens = baseline_tokens.saturating_sub(actual_tokens);
        let reduction_pct = if baseline_tokens > 0 {
            saved_tokens as f64 / baseline_tokens as f64 * 100.0
        } else {
            0.0
        };

        let session = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            let stats = state.sessions.entry(session_id.clone()).or_default();

            stats.queries += 1;
            match kind {
                QueryKind::Simple => stats.simple += 1,
                QueryKind::Medium => stats.medium += 1,
                QueryKind::Complex => stats.complex += 1,
                QueryKind::Escalated => stats.escalated += 1,
            }
            if fallback {
                stats.fallback += 1;
            }
            stats.actual_tokens += actual_tokens as u64;
            stats.baseline_tokens += baseline_tokens as u64;
            stats.saved_tokens += saved_tokens as u64;
            stats.peak_savings = stats.peak_savings.max(saved_tokens as u64);
            stats.average_reduction = if stats.baseline_tokens > 0 {
                stats.saved_tokens as f64 / stats.baseline_tokens as f64 * 100.0
            } else {
                0.0
            };
            let session = *stats;

            state.totals.queries += 1;
            state.totals.actual_tokens += actual_tokens as u64;
            state.totals.baseline_tokens += baseline_tokens as u64;
            state.totals.saved_tokens += saved_tokens as u64;
            session
        };

        tracing::debug!(
            session = %session_id,
            %kind,
            actual = actual_tokens,
            baseline = baseline_tokens,
            saved = saved_tokens,
            "Recorded query usage"
        );

        UsageReport {
            session_id: session_id.clone(),
            kind,
            actual_tokens,
            baseline_tokens,
            saved_tokens,
            reduction_pct,
            session,
        }
    }

    /// Statistics for one session, if any queries were recorded for it.
    pub fn session(&self, session_id: &SessionId) -> Option<SessionStats> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .sessions
            .get(session_id)
            .copied()
    }

    /// Totals across all sessions.
    pub fn totals(&self) -> GlobalTotals {
        self.state.read().unwrap_or_else(|e| e.into_inner()).totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> UsageTracker {
        UsageTracker::new(Baselines::default())
    }

    #[test]
    fn report_computes_savings_against_tier_baseline() {
        let t = tracker();
        let session = SessionId::from("s1");
        let report = t.record(&session, QueryKind::Simple, true, 60);
        assert_eq!(report.baseline_tokens, 1500);
        assert_eq!(report.saved_tokens, 1440);
        assert!((report.reduction_pct - 96.0).abs() < 0.01);
    }

    #[test]
    fn session_buckets_accumulate() {
        let t = tracker();
        let session = SessionId::from("s1");
        t.record(&session, QueryKind::Simple, true, 60);
        t.record(&session, QueryKind::Medium, false, 320);
        let report = t.record(&session, QueryKind::Complex, false, 900);

        let s = report.session;
        assert_eq!(s.queries, 3);
        assert_eq!(s.simple, 1);
        assert_eq!(s.medium, 1);
        assert_eq!(s.complex, 1);
        assert_eq!(s.fallback, 1);
        assert_eq!(s.actual_tokens, 60 + 320 + 900);
        assert_eq!(s.baseline_tokens, 1500 + 1800 + 2500);
        // Largest single saving was the SIMPLE canned turn
        assert_eq!(s.peak_savings, 1440);
        assert!(s.average_reduction > 0.0);
    }

    #[test]
    fn totals_grow_monotonically() {
        let t = tracker();
        let a = SessionId::from("a");
        let b = SessionId::from("b");
        let mut last = t.totals();
        for (session, kind, tokens) in [
            (&a, QueryKind::Simple, 40),
            (&b, QueryKind::Complex, 1100),
            (&a, QueryKind::Medium, 350),
        ] {
            t.record(session, kind, false, tokens);
            let now = t.totals();
            assert!(now.queries > last.queries);
            assert!(now.actual_tokens >= last.actual_tokens);
            assert!(now.baseline_tokens > last.baseline_tokens);
            assert!(now.saved_tokens >= last.saved_tokens);
            last = now;
        }
        assert_eq!(last.queries, 3);
    }

    #[test]
    fn sessions_are_isolated() {
        let t = tracker();
        let a = SessionId::from("a");
        let b = SessionId::from("b");
        t.record(&a, QueryKind::Simple, false, 40);
        t.record(&b, QueryKind::Complex, false, 1000);

        assert_eq!(t.session(&a).unwrap().queries, 1);
        assert_eq!(t.session(&a).unwrap().simple, 1);
        assert_eq!(t.session(&b).unwrap().complex, 1);
        assert!(t.session(&SessionId::from("c")).is_none());
    }

    #[test]
    fn overrun_saves_nothing_but_never_goes_negative() {
        let t = tracker();
        let session = SessionId::from("s1");
        let report = t.record(&session, QueryKind::Simple, false, 2000);
        assert_eq!(report.saved_tokens, 0);
        assert_eq!(report.reduction_pct, 0.0);
        assert_eq!(report.session.peak_savings, 0);
    }

    #[test]
    fn escalated_uses_complex_baseline() {
        let t = tracker();
        let session = SessionId::from("s1");
        let report = t.record(&session, QueryKind::Escalated, false, 1000);
        assert_eq!(report.baseline_tokens, 2500);
        assert_eq!(report.session.escalated, 1);
    }
}
