use std::sync::Arc;

use anyhow::{Context as _, Result};
use log::{error, info};
use serenity::prelude::*;

use tenki_forecast_bot::app_config::{AppConfig, Secrets};
use tenki_forecast_bot::event_handler::Handler;
use tenki_forecast_bot::forecast::WebDriverForecast;
use tenki_forecast_bot::forecast_store::ForecastStore;
use tenki_forecast_bot::logger;
use tenki_forecast_bot::schedule::TriggerSpec;

#[tokio::main]
async fn main() -> Result<()> {
    // 設定を読み込む
    let app_config = AppConfig::load_config()?;
    logger::init_logger(&app_config.log_level)?;

    // 環境変数が無ければ起動しない
    let secrets = Secrets::from_env()?;

    let trigger = TriggerSpec::from_config(&app_config.forecast)?;
    let store = Arc::new(ForecastStore::new(&secrets.database_url)?);
    let source = Arc::new(WebDriverForecast::new(
        app_config.webdriver.clone(),
        app_config.forecast.clone(),
    ));
    let handler = Handler::new(app_config, source, store, trigger)?;

    // スラッシュコマンドだけなのでメッセージ内容は不要
    let intents = GatewayIntents::GUILDS;
    let mut client = Client::builder(&secrets.discord_token, intents)
        .event_handler(handler)
        .await
        .context("クライアントの作成に失敗")?;

    info!("Bot起動");
    if let Err(why) = client.start().await {
        error!("クライアントの実行中にエラー: {:?}", why);
        return Err(why.into());
    }
    Ok(())
}
