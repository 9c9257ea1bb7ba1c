use std::fmt;

use anyhow::{bail, Result};

/// Majors and crosses polled when `SYMBOLS` is not set.
pub const FOREX_PAIRS: [&str; 28] = [
    "AUDCAD", "AUDCHF", "AUDJPY", "AUDNZD", "AUDUSD",
    "CADCHF", "CADJPY", "CHFJPY", "EURAUD", "EURCAD",
    "EURCHF", "EURGBP", "EURJPY", "EURNZD", "EURUSD",
    "GBPAUD", "GBPCAD", "GBPCHF", "GBPJPY", "GBPNZD",
    "GBPUSD", "NZDCAD", "NZDCHF", "NZDJPY", "NZDUSD",
    "USDCAD", "USDCHF", "USDJPY",
];

pub const DEFAULT_MAX_DAILY_ALERTS: u32 = 800;

/// Tradable pair identifier as the provider expects it (e.g. `EURUSD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub chat_id: String,
    pub bot_token: String,
    pub max_daily_alerts: u32,
    pub symbols: Vec<Symbol>,
    pub twelvedata_base: String,
    pub telegram_base: String,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. All missing credentials
    /// are named in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = required("API_KEY");
        let chat_id = required("CHAT_ID");
        let bot_token = required("BOT_TOKEN");

        let missing: Vec<&str> = [
            ("API_KEY", api_key.is_none()),
            ("CHAT_ID", chat_id.is_none()),
            ("BOT_TOKEN", bot_token.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(key, _)| *key)
        .collect();

        let (Some(api_key), Some(chat_id), Some(bot_token)) = (api_key, chat_id, bot_token) else {
            bail!("missing required configuration: {}", missing.join(", "));
        };

        Ok(Self {
            api_key: api_key.trim().to_string(),
            chat_id: chat_id.trim().to_string(),
            bot_token: bot_token.trim().to_string(),
            max_daily_alerts: parse_max_alerts(lookup("MAX_DAILY_ALERTS").as_deref()),
            symbols: parse_symbols(lookup("SYMBOLS").as_deref()),
            twelvedata_base: lookup("TWELVEDATA_BASE")
                .unwrap_or_else(|| "https://api.twelvedata.com".to_string()),
            telegram_base: lookup("TELEGRAM_BASE")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            http_timeout_secs: lookup("HTTP_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(30),
        })
    }
}

/// Zero and garbage fall back to the default ceiling.
fn parse_max_alerts(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_DAILY_ALERTS)
}

fn parse_symbols(raw: Option<&str>) -> Vec<Symbol> {
    let mut out: Vec<Symbol> = Vec::new();
    if let Some(list) = raw {
        for part in list.split(',') {
            if part.trim().is_empty() {
                continue;
            }
            let sym = Symbol::new(part);
            if !out.contains(&sym) {
                out.push(sym);
            }
        }
    }
    if out.is_empty() {
        out = FOREX_PAIRS.iter().map(|p| Symbol::new(p)).collect();
    }
    out
}
