//! Threshold rules turning an indicator snapshot into at most one message.
//!
//! Both paths are pure: same snapshot and timestamp, same decision.

use chrono::{DateTime, FixedOffset};

use crate::feed::{Ichimoku, IndicatorSnapshot, EMA_PERIOD};
use crate::schedule::display_time;
use crate::state::Symbol;

pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;

/// RSI levels reported by the zone scan, ascending.
pub const ZONES: [i64; 6] = [10, 20, 30, 80, 90, 100];

#[derive(Debug, Clone, PartialEq)]
pub enum AlertKind {
    /// RSI outside the 30..=70 band. Replaces the full report.
    RsiExtreme { rsi: f64 },
    FullReport { rsi: f64, ema: f64, ichimoku: Ichimoku },
    ZoneTriggered { rsi: f64, zone: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub symbol: Symbol,
    pub kind: AlertKind,
    pub at: DateTime<FixedOffset>,
}

impl Alert {
    pub fn label(&self) -> &'static str {
        match self.kind {
            AlertKind::RsiExtreme { .. } => "rsi_alert",
            AlertKind::FullReport { .. } => "full_report",
            AlertKind::ZoneTriggered { .. } => "zone_triggered",
        }
    }

    /// Markdown body for the messaging sink.
    pub fn render(&self) -> String {
        let ts = display_time(self.at);
        let sym = &self.symbol;
        match &self.kind {
            AlertKind::RsiExtreme { rsi } => {
                format!("⚠️ *RSI Alert* for *{sym}*\nRSI: *{rsi:.2}*\n🕒 {ts}")
            }
            AlertKind::FullReport { rsi, ema, ichimoku } => format!(
                "📊 *Indicators for {sym}*\n\
                 *RSI:* {rsi:.2}\n\
                 *EMA ({EMA_PERIOD}):* {ema}\n\
                 *Tenkan-sen:* {}\n\
                 *Kijun-sen:* {}\n\
                 *Senkou Span B:* {}\n\
                 🕒 {ts}",
                ichimoku.tenkan_sen, ichimoku.kijun_sen, ichimoku.senkou_span_b,
            ),
            AlertKind::ZoneTriggered { rsi, zone } => format!(
                "🔔 *RSI Zone Triggered* for *{sym}*\nRSI: *{rsi:.2}* near *{zone}*\n🕒 {ts}"
            ),
        }
    }
}

/// Notice sent once at process start, outside the rule paths.
pub fn startup_message(at: DateTime<FixedOffset>) -> String {
    format!("🚀 RSI Alert Bot Started Successfully!\n\n🕒 Time: {}", display_time(at))
}

/// Hourly path. Needs every indicator; an out-of-band RSI wins over the report.
pub fn evaluate_full(
    symbol: &Symbol,
    snapshot: &IndicatorSnapshot,
    at: DateTime<FixedOffset>,
) -> Option<Alert> {
    let data = snapshot.complete()?;

    let kind = if data.rsi < RSI_OVERSOLD || data.rsi > RSI_OVERBOUGHT {
        AlertKind::RsiExtreme { rsi: data.rsi }
    } else {
        AlertKind::FullReport { rsi: data.rsi, ema: data.ema, ichimoku: data.ichimoku }
    };
    Some(Alert { symbol: symbol.clone(), kind, at })
}

/// Six-hourly path. Only RSI is needed; fires when floor(RSI) is a zone.
pub fn evaluate_zones(symbol: &Symbol, rsi: Option<f64>, at: DateTime<FixedOffset>) -> Option<Alert> {
    let rsi = rsi.filter(|r| r.is_finite())?;
    let level = rsi.floor() as i64;
    let zone = ZONES.iter().copied().find(|z| *z == level)?;
    Some(Alert {
        symbol: symbol.clone(),
        kind: AlertKind::ZoneTriggered { rsi, zone },
        at,
    })
}
