//! Per-event settlement batch report.

use super::id::WagerId;

/// One wager whose settlement failed; the rest of the batch proceeds.
#[derive(Debug, Clone)]
pub struct SettlementFailure {
    pub wager_id: WagerId,
    /// Human-readable error message.
    pub error: String,
}

/// Outcome of one `settle_event` invocation.
#[derive(Debug, Clone, Default)]
pub struct SettlementReport {
    /// Wagers moved to `won` by this invocation.
    pub won: usize,
    /// Wagers moved to `lost` by this invocation.
    pub lost: usize,
    /// Wagers already terminal when visited (idempotent re-invocation).
    pub skipped: usize,
    /// Wagers whose settlement errored; counted, never aborting the batch.
    pub failures: Vec<SettlementFailure>,
}

impl SettlementReport {
    /// Total wagers visited by this invocation.
    #[must_use]
    pub fn total(&self) -> usize {
        self.won + self.lost + self.skipped + self.failures.len()
    }

    /// True when every visited wager settled cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
