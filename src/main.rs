use anyhow::Result;
use serde_json::json;

use rsifx::budget::AlertBudget;
use rsifx::driver::Driver;
use rsifx::feed::twelvedata::TwelveData;
use rsifx::logging::{log, obj, v_str, Domain, Level};
use rsifx::notify::telegram::TelegramSink;
use rsifx::notify::Notifier;
use rsifx::state::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            log(
                Level::Fatal,
                Domain::System,
                "config_invalid",
                obj(&[("error", v_str(&format!("{e:#}")))]),
            );
            return Err(e);
        }
    };
    log(
        Level::Info,
        Domain::System,
        "config",
        obj(&[
            ("symbols", json!(cfg.symbols.iter().map(|s| s.as_str()).collect::<Vec<_>>())),
            ("max_daily_alerts", json!(cfg.max_daily_alerts)),
            ("http_timeout_secs", json!(cfg.http_timeout_secs)),
        ]),
    );

    let source = TwelveData::new(&cfg)?;
    let sink = TelegramSink::new(&cfg)?;
    let notifier = Notifier::new(sink, AlertBudget::new(cfg.max_daily_alerts));
    let mut driver = Driver::new(cfg.symbols.clone(), source, notifier);

    driver.run_forever().await
}
