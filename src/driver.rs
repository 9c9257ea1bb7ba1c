//! Scheduled fetch -> evaluate -> notify over the configured symbols.
//!
//! Symbols are processed strictly one after another, so at most one request
//! is in flight against the provider or the sink. Jobs run on a single loop:
//! a slow pass delays the next trigger instead of overlapping it.

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tokio::time::{sleep, Duration};

use crate::feed::IndicatorSource;
use crate::logging::{log, obj, v_str, Domain, Level, ProfileScope};
use crate::notify::{Delivery, MessageSink, Notifier};
use crate::rules::{evaluate_full, evaluate_zones, startup_message, Alert};
use crate::schedule::{is_stale, next_fire, now_local, Job};
use crate::state::Symbol;

/// Outcome counts for one pass over the symbol set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub symbols: usize,
    pub sent: usize,
    pub suppressed: usize,
    /// Data complete, no rule fired.
    pub no_alert: usize,
    /// Required indicator missing.
    pub skipped: usize,
    /// Sink rejected or unreachable.
    pub failed: usize,
}

impl PassReport {
    fn log(&self, job: Job) {
        log(
            Level::Info,
            Domain::Schedule,
            "pass_complete",
            obj(&[
                ("job", v_str(job.as_str())),
                ("symbols", json!(self.symbols)),
                ("sent", json!(self.sent)),
                ("suppressed", json!(self.suppressed)),
                ("no_alert", json!(self.no_alert)),
                ("skipped", json!(self.skipped)),
                ("failed", json!(self.failed)),
            ]),
        );
    }
}

pub struct Driver<S, K> {
    symbols: Vec<Symbol>,
    source: S,
    notifier: Notifier<K>,
}

impl<S, K> Driver<S, K>
where
    S: IndicatorSource + Sync,
    K: MessageSink + Sync,
{
    pub fn new(symbols: Vec<Symbol>, source: S, notifier: Notifier<K>) -> Self {
        Self { symbols, source, notifier }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn notifier(&self) -> &Notifier<K> {
        &self.notifier
    }

    /// Start notice, then one full pass.
    pub async fn startup(&mut self) -> PassReport {
        log(
            Level::Info,
            Domain::System,
            "startup",
            obj(&[
                ("symbols", json!(self.symbols.len())),
                ("max_daily_alerts", json!(self.notifier.budget().max())),
            ]),
        );
        match self.notifier.send(&startup_message(now_local())).await {
            Ok(delivery) => log(
                Level::Info,
                Domain::Notify,
                "startup_notice",
                obj(&[("delivery", v_str(delivery_str(delivery)))]),
            ),
            Err(e) => log(
                Level::Error,
                Domain::Notify,
                "delivery_failed",
                obj(&[("kind", v_str("startup")), ("error", v_str(&format!("{e:#}")))]),
            ),
        }
        self.run_full_pass().await
    }

    pub async fn run_full_pass(&mut self) -> PassReport {
        let _scope = ProfileScope::with_context("pass", &[("job", v_str(Job::FullCheck.as_str()))]);
        let mut report = PassReport { symbols: self.symbols.len(), ..Default::default() };
        let symbols = self.symbols.clone();
        for symbol in &symbols {
            let snapshot = self.source.fetch_snapshot(symbol).await;
            match evaluate_full(symbol, &snapshot, now_local()) {
                Some(alert) => self.deliver(&alert, &mut report).await,
                None => {
                    report.skipped += 1;
                    log(
                        Level::Debug,
                        Domain::Rules,
                        "skipped",
                        obj(&[
                            ("symbol", v_str(symbol.as_str())),
                            ("missing", json!(snapshot.missing())),
                        ]),
                    );
                }
            }
        }
        report.log(Job::FullCheck);
        report
    }

    pub async fn run_zone_pass(&mut self) -> PassReport {
        let _scope = ProfileScope::with_context("pass", &[("job", v_str(Job::ZoneCheck.as_str()))]);
        let mut report = PassReport { symbols: self.symbols.len(), ..Default::default() };
        let symbols = self.symbols.clone();
        for symbol in &symbols {
            let rsi = self.source.fetch_rsi(symbol).await;
            if rsi.is_none() {
                report.skipped += 1;
                continue;
            }
            match evaluate_zones(symbol, rsi, now_local()) {
                Some(alert) => self.deliver(&alert, &mut report).await,
                None => report.no_alert += 1,
            }
        }
        report.log(Job::ZoneCheck);
        report
    }

    pub fn reset_budget(&mut self) {
        self.notifier.reset_budget();
    }

    /// Dispatches one scheduled job. Reset yields an empty report.
    pub async fn run_job(&mut self, job: Job) -> PassReport {
        match job {
            Job::DailyReset => {
                self.reset_budget();
                PassReport::default()
            }
            Job::FullCheck => self.run_full_pass().await,
            Job::ZoneCheck => self.run_zone_pass().await,
        }
    }

    /// Startup, then trigger jobs at their wall-clock instants until ctrl-c.
    pub async fn run_forever(&mut self) -> Result<()> {
        let mut cursor = Utc::now();
        self.startup().await;
        loop {
            let fire = next_fire(cursor);
            let wait = (fire.at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            log(
                Level::Debug,
                Domain::Schedule,
                "next_fire",
                obj(&[
                    ("at", v_str(&fire.at.to_rfc3339())),
                    ("jobs", json!(fire.jobs.iter().map(Job::as_str).collect::<Vec<_>>())),
                    ("wait_secs", json!(wait.as_secs())),
                ]),
            );
            tokio::select! {
                _ = sleep(wait) => {}
                res = tokio::signal::ctrl_c() => {
                    res?;
                    log(
                        Level::Info,
                        Domain::System,
                        "shutdown",
                        obj(&[("budget_sent", json!(self.notifier.budget().sent()))]),
                    );
                    return Ok(());
                }
            }
            let now = Utc::now();
            if is_stale(fire.at, now) {
                log(
                    Level::Warn,
                    Domain::Schedule,
                    "missed_fire",
                    obj(&[
                        ("at", v_str(&fire.at.to_rfc3339())),
                        ("jobs", json!(fire.jobs.iter().map(Job::as_str).collect::<Vec<_>>())),
                    ]),
                );
                cursor = now;
                continue;
            }
            for job in &fire.jobs {
                self.run_job(*job).await;
            }
            cursor = fire.at;
        }
    }

    async fn deliver(&mut self, alert: &Alert, report: &mut PassReport) {
        let symbol = alert.symbol.as_str();
        match self.notifier.send(&alert.render()).await {
            Ok(Delivery::Sent) => {
                report.sent += 1;
                log(
                    Level::Info,
                    Domain::Notify,
                    "sent",
                    obj(&[("symbol", v_str(symbol)), ("alert", v_str(alert.label()))]),
                );
            }
            Ok(Delivery::Suppressed) => report.suppressed += 1,
            Err(e) => {
                report.failed += 1;
                log(
                    Level::Error,
                    Domain::Notify,
                    "delivery_failed",
                    obj(&[
                        ("symbol", v_str(symbol)),
                        ("alert", v_str(alert.label())),
                        ("error", v_str(&format!("{e:#}"))),
                    ]),
                );
            }
        }
    }
}

fn delivery_str(d: Delivery) -> &'static str {
    match d {
        Delivery::Sent => "sent",
        Delivery::Suppressed => "suppressed",
    }
}
