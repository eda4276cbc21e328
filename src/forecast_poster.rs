use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serenity::model::id::ChannelId;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::app_config::ForecastConfig;
use crate::command::Reply;
use crate::forecast::{forecast_reply, ForecastSource};
use crate::forecast_store::ChannelStore;
use crate::schedule::{time_until_next_trigger, TriggerSpec};

/// 予報の送信先
#[async_trait]
pub trait Destination: Send + Sync {
    /// チャンネルに投稿する (チャンネルが無ければエラー)
    async fn send(&self, channel_id: ChannelId, reply: &Reply) -> Result<()>;
}

/// 一斉送信の結果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// 送信できたチャンネル
    pub delivered: Vec<ChannelId>,
    /// 送信できなかったチャンネル
    pub failed: Vec<ChannelId>,
}

/// 全チャンネルに投稿する
///
/// 1つのチャンネルで失敗しても残りには送信する。
pub async fn post_to_all<D: Destination + ?Sized>(
    destination: &D,
    channel_ids: &[ChannelId],
    reply: &Reply,
) -> FanOutReport {
    let mut report = FanOutReport::default();
    for &channel_id in channel_ids {
        match destination.send(channel_id, reply).await {
            Ok(()) => report.delivered.push(channel_id),
            Err(why) => {
                warn!("予報の投稿に失敗: {}: {:?}", channel_id, why);
                report.failed.push(channel_id);
            }
        }
    }
    report
}

/// 毎日決まった時刻に予報を投稿する
pub struct ForecastPoster<D> {
    /// 予報図の取得元
    source: Arc<dyn ForecastSource>,
    /// 投稿先チャンネルの保存先
    store: Arc<dyn ChannelStore>,
    /// 送信先
    destination: D,
    /// 予報の設定
    config: ForecastConfig,
    /// 投稿時刻
    trigger: TriggerSpec,
}

impl<D: Destination> ForecastPoster<D> {
    pub fn new(
        source: Arc<dyn ForecastSource>,
        store: Arc<dyn ChannelStore>,
        destination: D,
        config: ForecastConfig,
        trigger: TriggerSpec,
    ) -> Self {
        Self {
            source,
            store,
            destination,
            config,
            trigger,
        }
    }

    /// 1回分の投稿を行う
    pub async fn tick(&self) -> Result<FanOutReport> {
        let image = self
            .source
            .fetch_image()
            .await
            .context("予報図の取得に失敗")?;
        let channel_ids = self
            .store
            .get_all_channel_ids()
            .await
            .context("投稿先チャンネルの取得に失敗")?;
        let reply = forecast_reply(image, &self.config);
        Ok(post_to_all(&self.destination, &channel_ids, &reply).await)
    }

    /// プロセスが終了するまで毎日投稿する
    pub async fn run(self) {
        self.run_from(Utc::now()).await
    }

    /// `now` を起点に、次の投稿時刻から1日ごとに投稿する
    pub async fn run_from(self, now: DateTime<Utc>) {
        let delay = match time_until_next_trigger(now, &self.trigger).to_std() {
            Ok(delay) => delay,
            Err(why) => {
                error!("次の投稿時刻の計算に失敗: {:?}", why);
                return;
            }
        };
        let period = match TriggerSpec::period().to_std() {
            Ok(period) => period,
            Err(why) => {
                error!("投稿間隔の計算に失敗: {:?}", why);
                return;
            }
        };
        info!(
            "{}秒後 ({} {}) から予報を投稿します",
            delay.as_secs(),
            self.trigger.time,
            self.trigger.label
        );

        let mut interval = interval_at(Instant::now() + delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.tick().await {
                Ok(report) => info!(
                    "予報を投稿: 成功 {} 件, 失敗 {} 件",
                    report.delivered.len(),
                    report.failed.len()
                ),
                Err(why) => error!("予報の投稿に失敗: {:?}", why),
            }
        }
    }
}
