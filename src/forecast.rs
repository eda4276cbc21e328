use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use base64::Engine as _;
use log::{debug, warn};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::app_config::{ForecastConfig, WebDriverConfig};
use crate::command::{Attachment, EmbedAuthor, Reply, ReplyEmbed};

/// 予報図の取得元
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// 予報図 (PNG) を取得する
    async fn fetch_image(&self) -> Result<Vec<u8>>;
}

/// 予報図の投稿内容を作る
pub fn forecast_reply(image: Vec<u8>, config: &ForecastConfig) -> Reply {
    Reply::embed(ReplyEmbed {
        author: Some(EmbedAuthor {
            name: config.author_name.clone(),
            url: Some(config.page_url.clone()),
            icon_url: Some(config.author_icon_url.clone()),
        }),
        ..Default::default()
    })
    .with_attachment(Attachment {
        filename: config.file_name.clone(),
        data: image,
    })
}

/// WebDriverの応答
#[derive(Debug, serde::Deserialize)]
struct WebDriverResponse<T> {
    value: T,
}

/// WebDriverのエラー応答
#[derive(Debug, serde::Deserialize)]
struct WebDriverError {
    error: String,
    message: String,
}

/// セッション作成の応答
#[derive(Debug, serde::Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// 要素の参照 (W3C WebDriverの固定キー)
#[derive(Debug, serde::Deserialize)]
struct ElementRef {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    id: String,
}

/// chromedriver経由で要素のスクリーンショットを撮る
pub struct WebDriverForecast {
    /// HTTPクライアント
    client: reqwest::Client,
    /// WebDriverの設定
    webdriver: WebDriverConfig,
    /// 予報ページの設定
    forecast: ForecastConfig,
}

impl WebDriverForecast {
    pub fn new(webdriver: WebDriverConfig, forecast: ForecastConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            webdriver,
            forecast,
        }
    }

    /// セッション作成時のCapabilities
    fn capabilities(&self) -> Value {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!(
                "--window-size={},{}",
                self.webdriver.window_width, self.webdriver.window_height
            ),
        ];
        if self.webdriver.headless {
            args.insert(0, "--headless".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }

    /// WebDriverコマンドを実行する
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let url = format!("{}/{}", self.webdriver.url.trim_end_matches('/'), path);
        debug!("WebDriver: {} {}", method, url);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("WebDriverへの接続に失敗: {}", url))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("WebDriverの応答の読み込みに失敗: {}", url))?;
        parse_response(status.is_success(), &text).with_context(|| format!("{} ({})", url, status))
    }

    /// 要素のスクリーンショットを撮る
    async fn screenshot(&self, session_id: &str) -> Result<Vec<u8>> {
        self.execute::<Value>(
            Method::POST,
            &format!("session/{}/url", session_id),
            Some(json!({ "url": self.forecast.page_url })),
        )
        .await
        .context("予報ページを開けませんでした")?;

        let element: ElementRef = self
            .execute(
                Method::POST,
                &format!("session/{}/element", session_id),
                Some(json!({
                    "using": "css selector",
                    "value": format!("#{}", self.forecast.element_id),
                })),
            )
            .await
            .with_context(|| format!("要素 #{} が見つかりません", self.forecast.element_id))?;

        let encoded: String = self
            .execute(
                Method::GET,
                &format!("session/{}/element/{}/screenshot", session_id, element.id),
                None,
            )
            .await
            .context("スクリーンショットの取得に失敗")?;
        decode_png(&encoded)
    }
}

#[async_trait]
impl ForecastSource for WebDriverForecast {
    async fn fetch_image(&self) -> Result<Vec<u8>> {
        let session: NewSession = self
            .execute(Method::POST, "session", Some(self.capabilities()))
            .await
            .context("ブラウザの起動に失敗")?;

        let image = self.screenshot(&session.session_id).await;

        // 成否に関わらずセッションを閉じる
        if let Err(why) = self
            .execute::<Value>(
                Method::DELETE,
                &format!("session/{}", session.session_id),
                None,
            )
            .await
        {
            warn!("ブラウザの終了に失敗: {:?}", why);
        }

        image
    }
}

/// WebDriverの応答から `value` を取り出す
fn parse_response<T: DeserializeOwned>(success: bool, text: &str) -> Result<T> {
    if !success {
        match serde_json::from_str::<WebDriverResponse<WebDriverError>>(text) {
            Ok(response) => bail!(
                "WebDriverエラー: {}: {}",
                response.value.error,
                response.value.message
            ),
            Err(_) => bail!("WebDriverエラー: {}", text),
        }
    }
    let response = serde_json::from_str::<WebDriverResponse<T>>(text)
        .with_context(|| format!("WebDriverの応答をパースできません: {}", text))?;
    Ok(response.value)
}

/// base64のPNGをデコードする
fn decode_png(encoded: &str) -> Result<Vec<u8>> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .context("スクリーンショットのデコードに失敗")?;
    if !data.starts_with(b"\x89PNG") {
        bail!("スクリーンショットがPNGではありません");
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_reply_carries_image_and_author() {
        let config = ForecastConfig::default();
        let reply = forecast_reply(vec![1, 2, 3], &config);

        let attachment = reply.attachment.unwrap();
        assert_eq!(attachment.filename, "tenki.png");
        assert_eq!(attachment.data, vec![1, 2, 3]);

        let author = reply.embed.unwrap().author.unwrap();
        assert_eq!(author.name, "tenki.jp");
        assert_eq!(author.url.as_deref(), Some("https://tenki.jp"));
        assert!(!reply.ephemeral);
    }

    #[test]
    fn capabilities_follow_config() {
        let source = WebDriverForecast::new(WebDriverConfig::default(), ForecastConfig::default());
        let caps = source.capabilities();
        let args = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"];
        assert_eq!(
            args,
            &json!([
                "--headless",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--window-size=800,1000"
            ])
        );

        let headed = WebDriverForecast::new(
            WebDriverConfig {
                headless: false,
                ..WebDriverConfig::default()
            },
            ForecastConfig::default(),
        );
        let caps = headed.capabilities();
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(!args.contains(&json!("--headless")));
    }

    #[test]
    fn parses_session_and_element_responses() {
        let session: NewSession = parse_response(
            true,
            r#"{"value":{"sessionId":"abc","capabilities":{"browserName":"chrome"}}}"#,
        )
        .unwrap();
        assert_eq!(session.session_id, "abc");

        let element: ElementRef = parse_response(
            true,
            r#"{"value":{"element-6066-11e4-a52e-4f735466cecf":"el-1"}}"#,
        )
        .unwrap();
        assert_eq!(element.id, "el-1");
    }

    #[test]
    fn error_responses_surface_the_webdriver_message() {
        let err = parse_response::<Value>(
            false,
            r#"{"value":{"error":"no such element","message":"Unable to locate element","stacktrace":""}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no such element"));
        assert!(err.to_string().contains("Unable to locate element"));

        let err = parse_response::<Value>(false, "Bad Gateway").unwrap_err();
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn decodes_png_screenshots_only() {
        let png = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG\r\n\x1a\nrest");
        assert!(decode_png(&png).unwrap().starts_with(b"\x89PNG"));

        let text = base64::engine::general_purpose::STANDARD.encode(b"hello");
        assert!(decode_png(&text).is_err());
        assert!(decode_png("not base64!").is_err());
    }
}
