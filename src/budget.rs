use crate::logging::{log, obj, Domain, Level};
use serde_json::json;

/// Daily outbound message ceiling.
///
/// The gate is check-then-record: `try_consume` only looks, `record_sent` counts
/// a delivery the sink acknowledged. That holds the ceiling as long as checks and
/// sends run on one timeline, which the driver guarantees.
#[derive(Debug, Clone)]
pub struct AlertBudget {
    sent: u32,
    max: u32,
}

impl AlertBudget {
    pub fn new(max: u32) -> Self {
        Self { sent: 0, max }
    }

    pub fn try_consume(&self) -> bool {
        self.sent < self.max
    }

    pub fn record_sent(&mut self) {
        self.sent = self.sent.saturating_add(1).min(self.max);
    }

    pub fn reset(&mut self) {
        let previous = self.sent;
        self.sent = 0;
        log(
            Level::Info,
            Domain::Budget,
            "reset",
            obj(&[("previous", json!(previous)), ("max", json!(self.max))]),
        );
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}
