//! Outcome counters of one tick.

/// Result of draining the queue once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// Parent events taken from the queue
    pub parents: usize,
    /// Parents marked visited with success
    pub succeeded: usize,
    /// Parents marked visited with failure
    pub failed: usize,
    /// Sub-events processed successfully
    pub processed: usize,
    /// Sub-events skipped because their type has no rule
    pub skipped: usize,
}

impl TickSummary {
    /// Create a new empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a parent marked visited.
    pub fn record_parent(&mut self, success: bool) {
        self.parents += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Record a processed sub-event.
    pub fn record_processed(&mut self) {
        self.processed += 1;
    }

    /// Record a skipped sub-event.
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Merge another summary into this one.
    pub fn merge(&mut self, other: &TickSummary) {
        self.parents += other.parents;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.processed += other.processed;
        self.skipped += other.skipped;
    }

    /// Whether the tick saw any parent event.
    pub fn has_work(&self) -> bool {
        self.parents > 0
    }
}
