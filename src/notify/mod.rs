use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use crate::budget::AlertBudget;
use crate::logging::{log, obj, v_str, Domain, Level};

pub mod telegram;

/// Write-only message destination.
#[async_trait]
pub trait MessageSink {
    /// `Ok` only once the destination acknowledged the message.
    async fn deliver(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Daily ceiling reached; nothing went out.
    Suppressed,
}

/// Delivers messages through a sink, gated by the daily budget.
pub struct Notifier<K> {
    sink: K,
    budget: AlertBudget,
}

impl<K: MessageSink + Sync> Notifier<K> {
    pub fn new(sink: K, budget: AlertBudget) -> Self {
        Self { sink, budget }
    }

    pub async fn send(&mut self, text: &str) -> Result<Delivery> {
        if !self.budget.try_consume() {
            log(
                Level::Debug,
                Domain::Budget,
                "suppressed",
                obj(&[("sent", json!(self.budget.sent())), ("max", json!(self.budget.max()))]),
            );
            return Ok(Delivery::Suppressed);
        }

        self.sink.deliver(text).await?;
        self.budget.record_sent();
        if !self.budget.try_consume() {
            log(
                Level::Warn,
                Domain::Budget,
                "exhausted",
                obj(&[
                    ("msg", v_str("daily alert ceiling reached")),
                    ("max", json!(self.budget.max())),
                ]),
            );
        }
        Ok(Delivery::Sent)
    }

    pub fn budget(&self) -> &AlertBudget {
        &self.budget
    }

    pub fn reset_budget(&mut self) {
        self.budget.reset();
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}
