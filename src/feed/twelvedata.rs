use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::feed::{
    Ichimoku, IndicatorSource, EMA_PERIOD, ICHIMOKU_KIJUN, ICHIMOKU_SENKOU_B, ICHIMOKU_TENKAN,
    INTERVAL, RSI_PERIOD,
};
use crate::logging::{log, obj, redact_url, v_str, Domain, Level};
use crate::state::{Config, Symbol};

/// Twelve Data technical-indicator endpoints.
pub struct TwelveData {
    client: Client,
    base: String,
    api_key: String,
}

#[derive(Deserialize, Debug)]
struct SeriesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    values: Vec<serde_json::Map<String, Value>>,
}

impl TwelveData {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()
            .context("building indicator http client")?;
        Ok(Self {
            client,
            base: cfg.twelvedata_base.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }

    fn endpoint(&self, indicator: &str, symbol: &Symbol, params: &[(&str, String)]) -> Result<Url> {
        let mut query: Vec<(&str, String)> = vec![
            ("symbol", symbol.as_str().to_string()),
            ("interval", INTERVAL.to_string()),
        ];
        query.extend(params.iter().cloned());
        query.push(("apikey", self.api_key.clone()));
        Url::parse_with_params(&format!("{}/{}", self.base, indicator), &query)
            .with_context(|| format!("invalid provider url for {indicator}"))
    }

    async fn latest_row(&self, url: Url) -> Result<serde_json::Map<String, Value>> {
        // reqwest errors carry the URL, which embeds the api key.
        let resp = self.client.get(url).send().await.map_err(|e| e.without_url())?;
        let status = resp.status();
        if !status.is_success() {
            bail!("provider returned status {}", status.as_u16());
        }
        let body = resp.text().await.map_err(|e| e.without_url())?;
        first_row(&body)
    }

    /// Runs one request and turns every failure into `None` plus a warn record.
    async fn fetch<T: Send>(
        &self,
        indicator: &'static str,
        symbol: &Symbol,
        params: &[(&str, String)],
        extract: impl Fn(&serde_json::Map<String, Value>) -> Result<T> + Send,
    ) -> Option<T> {
        let outcome = match self.endpoint(indicator, symbol, params) {
            Ok(url) => {
                let shown = redact_url(url.as_str());
                self.latest_row(url)
                    .await
                    .and_then(|row| extract(&row))
                    .map_err(|e| (shown, e))
            }
            Err(e) => Err((String::new(), e)),
        };
        match outcome {
            Ok(value) => Some(value),
            Err((url, e)) => {
                log(
                    Level::Warn,
                    Domain::Market,
                    "indicator_unavailable",
                    obj(&[
                        ("symbol", v_str(symbol.as_str())),
                        ("indicator", v_str(indicator)),
                        ("url", v_str(&url)),
                        ("error", v_str(&format!("{e:#}"))),
                    ]),
                );
                None
            }
        }
    }
}

#[async_trait]
impl IndicatorSource for TwelveData {
    async fn fetch_rsi(&self, symbol: &Symbol) -> Option<f64> {
        let params = [
            ("time_period", RSI_PERIOD.to_string()),
            ("series_type", "close".to_string()),
        ];
        self.fetch("rsi", symbol, &params, |row| number_field(row, "rsi")).await
    }

    async fn fetch_ema(&self, symbol: &Symbol) -> Option<f64> {
        let params = [
            ("time_period", EMA_PERIOD.to_string()),
            ("series_type", "close".to_string()),
        ];
        self.fetch("ema", symbol, &params, |row| number_field(row, "ema")).await
    }

    async fn fetch_ichimoku(&self, symbol: &Symbol) -> Option<Ichimoku> {
        let params = [
            ("tenkan", ICHIMOKU_TENKAN.to_string()),
            ("kijun", ICHIMOKU_KIJUN.to_string()),
            ("senkou_b", ICHIMOKU_SENKOU_B.to_string()),
        ];
        self.fetch("ichimoku", symbol, &params, ichimoku_from_row).await
    }
}

/// First element of the `values` series; provider error bodies are rejected.
fn first_row(body: &str) -> Result<serde_json::Map<String, Value>> {
    let parsed: SeriesResponse = serde_json::from_str(body).context("malformed provider body")?;
    if parsed.status.as_deref() == Some("error") {
        bail!(
            "provider error: {}",
            parsed.message.unwrap_or_else(|| "unspecified".to_string())
        );
    }
    parsed
        .values
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("empty series"))
}

/// Values arrive as decimal strings; bare numbers are accepted too.
fn number_field(row: &serde_json::Map<String, Value>, field: &str) -> Result<f64> {
    let value = match row.get(field) {
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| anyhow!("field {field} missing or not numeric"))
}

fn ichimoku_from_row(row: &serde_json::Map<String, Value>) -> Result<Ichimoku> {
    Ok(Ichimoku {
        tenkan_sen: number_field(row, "tenkan_sen")?,
        kijun_sen: number_field(row, "kijun_sen")?,
        senkou_span_b: number_field(row, "senkou_span_b")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(body: &str) -> serde_json::Map<String, Value> {
        first_row(body).unwrap()
    }

    #[test]
    fn test_rsi_parsed_from_first_value() {
        let body = r#"{"meta":{"symbol":"EUR/USD"},"values":[
            {"datetime":"2026-10-16 10:00:00","rsi":"25.37"},
            {"datetime":"2026-10-16 09:00:00","rsi":"61.00"}],"status":"ok"}"#;
        assert_eq!(number_field(&row(body), "rsi").unwrap(), 25.37);
    }

    #[test]
    fn test_numeric_json_accepted() {
        let body = r#"{"values":[{"ema":1.2345}]}"#;
        assert_eq!(number_field(&row(body), "ema").unwrap(), 1.2345);
    }

    #[test]
    fn test_error_body_rejected() {
        let body = r#"{"code":429,"message":"You have run out of API credits","status":"error"}"#;
        let err = first_row(body).unwrap_err().to_string();
        assert!(err.contains("API credits"));
    }

    #[test]
    fn test_empty_series_and_garbage_rejected() {
        assert!(first_row(r#"{"values":[],"status":"ok"}"#).is_err());
        assert!(first_row("<html>bad gateway</html>").is_err());
    }

    #[test]
    fn test_non_numeric_and_non_finite_rejected() {
        assert!(number_field(&row(r#"{"values":[{"rsi":"n/a"}]}"#), "rsi").is_err());
        assert!(number_field(&row(r#"{"values":[{"rsi":"NaN"}]}"#), "rsi").is_err());
        assert!(number_field(&row(r#"{"values":[{"rsi":"inf"}]}"#), "rsi").is_err());
        assert!(number_field(&row(r#"{"values":[{"ema":"1.1"}]}"#), "rsi").is_err());
    }

    #[test]
    fn test_ichimoku_requires_all_three_lines() {
        let full = r#"{"values":[{"tenkan_sen":"1.1","kijun_sen":"1.2",
            "senkou_span_a":"1.25","senkou_span_b":"1.3","chikou_span":"1.0"}]}"#;
        assert_eq!(
            ichimoku_from_row(&row(full)).unwrap(),
            Ichimoku { tenkan_sen: 1.1, kijun_sen: 1.2, senkou_span_b: 1.3 }
        );

        let partial = r#"{"values":[{"tenkan_sen":"1.1","kijun_sen":"1.2"}]}"#;
        assert!(ichimoku_from_row(&row(partial)).is_err());
    }

    fn config_with(api_key: &str, base: Option<String>) -> Config {
        let vars = [("API_KEY", api_key), ("CHAT_ID", "1"), ("BOT_TOKEN", "t")];
        Config::from_lookup(|key| match key {
            "TWELVEDATA_BASE" => base.clone(),
            "HTTP_TIMEOUT_SECS" => Some("5".to_string()),
            _ => vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string()),
        })
        .unwrap()
    }

    fn test_config() -> Config {
        config_with("k3y", None)
    }

    #[test]
    fn test_endpoint_carries_fixed_parameters() {
        let td = TwelveData::new(&test_config()).unwrap();
        let url = td
            .endpoint(
                "ichimoku",
                &Symbol::new("EURUSD"),
                &[("tenkan", "2".to_string()), ("kijun", "2".to_string()), ("senkou_b", "52".to_string())],
            )
            .unwrap();
        assert_eq!(url.path(), "/ichimoku");
        let q = url.query().unwrap();
        assert!(q.contains("symbol=EURUSD"));
        assert!(q.contains("interval=1h"));
        assert!(q.contains("senkou_b=52"));
        assert!(q.ends_with("apikey=k3y"));
    }

    #[tokio::test]
    async fn test_unreachable_provider_error_hides_api_key() {
        let addr = crate::testutil::closed_port().await;
        let td = TwelveData::new(&config_with("SUPERSECRETKEY", Some(format!("http://{addr}")))).unwrap();
        let url = td.endpoint("rsi", &Symbol::new("EURUSD"), &[]).unwrap();
        assert!(url.as_str().contains("SUPERSECRETKEY"));

        let err = format!("{:#}", td.latest_row(url).await.unwrap_err());
        assert!(!err.contains("SUPERSECRETKEY"), "{err}");
        assert_eq!(td.fetch_rsi(&Symbol::new("EURUSD")).await, None);
    }

    #[tokio::test]
    async fn test_server_error_status_yields_none() {
        let body = r#"{"values":[{"rsi":"25.0"}],"status":"ok"}"#;
        let addr = crate::testutil::serve_once("500 Internal Server Error", body).await;
        let td = TwelveData::new(&config_with("k3y", Some(format!("http://{addr}")))).unwrap();
        assert_eq!(td.fetch_rsi(&Symbol::new("EURUSD")).await, None);

        let addr = crate::testutil::serve_once("500 Internal Server Error", body).await;
        let td = TwelveData::new(&config_with("k3y", Some(format!("http://{addr}")))).unwrap();
        let url = td.endpoint("rsi", &Symbol::new("EURUSD"), &[]).unwrap();
        let err = td.latest_row(url).await.unwrap_err().to_string();
        assert!(err.contains("500"), "{err}");
    }

    #[tokio::test]
    async fn test_ichimoku_unavailable_on_server_error_or_closed_port() {
        let addr = crate::testutil::serve_once("502 Bad Gateway", "<html>bad gateway</html>").await;
        let td = TwelveData::new(&config_with("k3y", Some(format!("http://{addr}")))).unwrap();
        assert_eq!(td.fetch_ichimoku(&Symbol::new("GBPJPY")).await, None);

        let addr = crate::testutil::closed_port().await;
        let td = TwelveData::new(&config_with("k3y", Some(format!("http://{addr}")))).unwrap();
        assert_eq!(td.fetch_ichimoku(&Symbol::new("GBPJPY")).await, None);
    }

    #[tokio::test]
    async fn test_ok_response_parsed_over_http() {
        let body = r#"{"values":[{"datetime":"2026-10-16 10:00:00","ema":"1.08512"}],"status":"ok"}"#;
        let addr = crate::testutil::serve_once("200 OK", body).await;
        let td = TwelveData::new(&config_with("k3y", Some(format!("http://{addr}")))).unwrap();
        assert_eq!(td.fetch_ema(&Symbol::new("EURUSD")).await, Some(1.08512));
    }
}
