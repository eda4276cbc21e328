use std::env;

use anyhow::{Context as _, Result};
use config::Config;

/// 天気予報の設定
#[derive(Debug, serde::Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct ForecastConfig {
    /// スクリーンショットを撮るページ
    pub page_url: String,
    /// 予報図の要素ID
    pub element_id: String,
    /// 添付ファイル名
    pub file_name: String,
    /// 埋め込みの作者名
    pub author_name: String,
    /// 埋め込みの作者アイコン
    pub author_icon_url: String,
    /// 投稿する時 (現地時間)
    pub trigger_hour: u32,
    /// 投稿する分 (現地時間)
    pub trigger_minute: u32,
    /// UTCからの時差 (時間)
    pub utc_offset_hours: i32,
    /// タイムゾーン名
    pub timezone_label: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            page_url: "https://tenki.jp".to_string(),
            element_id: "forecast-map-wrap".to_string(),
            file_name: "tenki.png".to_string(),
            author_name: "tenki.jp".to_string(),
            author_icon_url: "http://static.tenki.jp/images/icon/logo/icon_tenkijp_640_640.png"
                .to_string(),
            trigger_hour: 5,
            trigger_minute: 0,
            utc_offset_hours: 9,
            timezone_label: "JST".to_string(),
        }
    }
}

/// WebDriverの設定
#[derive(Debug, serde::Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct WebDriverConfig {
    /// chromedriverのURL
    pub url: String,
    /// ウィンドウの幅
    pub window_width: u32,
    /// ウィンドウの高さ
    pub window_height: u32,
    /// ヘッドレスで起動するか
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".to_string(),
            window_width: 800,
            window_height: 1000,
            headless: true,
        }
    }
}

/// アプリケーションの設定
#[derive(Debug, serde::Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// ログレベル
    pub log_level: String,
    /// 天気予報の設定
    pub forecast: ForecastConfig,
    /// WebDriverの設定
    pub webdriver: WebDriverConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            forecast: ForecastConfig::default(),
            webdriver: WebDriverConfig::default(),
        }
    }
}

impl AppConfig {
    /// 設定を読み込む
    pub fn load_config() -> Result<AppConfig> {
        // 設定ファイルを読み込む
        let config = Config::builder()
            // Add in `./bot/config.toml` if present
            .add_source(config::File::with_name("bot/config.toml").required(false))
            // Eg.. `APP_FORECAST__TRIGGER_HOUR=6 ./target/app` would set `forecast.trigger_hour`
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<AppConfig> {
        // 設定ファイルをパース
        let app_config = config
            .try_deserialize::<AppConfig>()
            .context("設定ファイルの読み込みに失敗")?;
        Ok(app_config)
    }
}

/// 環境変数から読み込む秘密情報
#[derive(Clone)]
pub struct Secrets {
    /// Botのトークン
    pub discord_token: String,
    /// SQLiteデータベースのパス
    pub database_url: String,
}

impl Secrets {
    /// 環境変数を読み込む (無ければ起動できない)
    pub fn from_env() -> Result<Secrets> {
        Ok(Secrets {
            discord_token: var("DISCORD_TOKEN")?,
            database_url: var("DATABASE_URL")?,
        })
    }
}

fn var(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("環境変数 {} が設定されていません", name))
}
