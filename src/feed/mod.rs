use async_trait::async_trait;

use crate::state::Symbol;

pub mod twelvedata;

/// Candle interval requested for every indicator.
pub const INTERVAL: &str = "1h";
pub const RSI_PERIOD: u32 = 1;
pub const EMA_PERIOD: u32 = 26;
pub const ICHIMOKU_TENKAN: u32 = 2;
pub const ICHIMOKU_KIJUN: u32 = 2;
pub const ICHIMOKU_SENKOU_B: u32 = 52;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ichimoku {
    pub tenkan_sen: f64,
    pub kijun_sen: f64,
    pub senkou_span_b: f64,
}

/// Indicator values for one symbol at fetch time. `None` means the provider
/// had nothing usable for that indicator on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub ema: Option<f64>,
    pub ichimoku: Option<Ichimoku>,
}

/// Snapshot with every field present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompleteSnapshot {
    pub rsi: f64,
    pub ema: f64,
    pub ichimoku: Ichimoku,
}

impl IndicatorSnapshot {
    pub fn complete(&self) -> Option<CompleteSnapshot> {
        Some(CompleteSnapshot {
            rsi: self.rsi?,
            ema: self.ema?,
            ichimoku: self.ichimoku?,
        })
    }

    /// Names of the indicators that came back empty, for logging.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.rsi.is_none() {
            out.push("rsi");
        }
        if self.ema.is_none() {
            out.push("ema");
        }
        if self.ichimoku.is_none() {
            out.push("ichimoku");
        }
        out
    }
}

/// Read-only indicator provider. One call is one request for one symbol;
/// every failure is reported as `None`, never as an error.
#[async_trait]
pub trait IndicatorSource {
    async fn fetch_rsi(&self, symbol: &Symbol) -> Option<f64>;
    async fn fetch_ema(&self, symbol: &Symbol) -> Option<f64>;
    async fn fetch_ichimoku(&self, symbol: &Symbol) -> Option<Ichimoku>;

    /// Fetches RSI, Ichimoku and EMA in that order, one request at a time.
    async fn fetch_snapshot(&self, symbol: &Symbol) -> IndicatorSnapshot {
        let rsi = self.fetch_rsi(symbol).await;
        let ichimoku = self.fetch_ichimoku(symbol).await;
        let ema = self.fetch_ema(symbol).await;
        IndicatorSnapshot { rsi, ema, ichimoku }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOUD: Ichimoku = Ichimoku { tenkan_sen: 1.1, kijun_sen: 1.2, senkou_span_b: 1.3 };

    #[test]
    fn test_complete_requires_all_fields() {
        let full = IndicatorSnapshot { rsi: Some(50.0), ema: Some(1.2), ichimoku: Some(CLOUD) };
        assert!(full.complete().is_some());
        assert!(full.missing().is_empty());

        let no_ema = IndicatorSnapshot { ema: None, ..full };
        assert!(no_ema.complete().is_none());
        assert_eq!(no_ema.missing(), vec!["ema"]);

        assert_eq!(IndicatorSnapshot::default().missing(), vec!["rsi", "ema", "ichimoku"]);
    }
}
