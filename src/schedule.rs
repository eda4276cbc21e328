use anyhow::{Context as _, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use log::debug;

use crate::app_config::ForecastConfig;

/// 毎日決まった現地時刻に発火する予定
///
/// 「1日」は午前0時ではなく発火時刻で切り替わる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSpec {
    /// 発火する現地時刻
    pub time: NaiveTime,
    /// UTCからの時差
    pub offset: FixedOffset,
    /// タイムゾーン名
    pub label: String,
}

impl TriggerSpec {
    pub fn new(time: NaiveTime, offset: FixedOffset, label: impl Into<String>) -> Self {
        Self {
            time,
            offset,
            label: label.into(),
        }
    }

    /// 設定から予定を作る
    pub fn from_config(config: &ForecastConfig) -> Result<TriggerSpec> {
        let time = NaiveTime::from_hms_opt(config.trigger_hour, config.trigger_minute, 0)
            .with_context(|| {
                format!(
                    "投稿時刻が不正です: {}:{}",
                    config.trigger_hour, config.trigger_minute
                )
            })?;
        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600)
            .with_context(|| format!("時差が不正です: {}", config.utc_offset_hours))?;
        Ok(TriggerSpec::new(time, offset, config.timezone_label.clone()))
    }

    /// 1周期の長さ
    pub fn period() -> Duration {
        Duration::days(1)
    }
}

/// `now` より後で最初の発火時刻
pub fn next_trigger_after(now: DateTime<Utc>, trigger: &TriggerSpec) -> DateTime<FixedOffset> {
    let local = now.with_timezone(&trigger.offset);
    let mut date = local.date_naive();
    // 発火時刻ちょうどは翌日扱い
    if local.time() >= trigger.time {
        date += Duration::days(1);
    }
    let target_local = date.and_time(trigger.time);
    let target_utc = target_local - Duration::seconds(i64::from(trigger.offset.local_minus_utc()));
    Utc.from_utc_datetime(&target_utc)
        .with_timezone(&trigger.offset)
}

/// 次の発火までの時間 (0より大きく1日以下)
pub fn time_until_next_trigger(now: DateTime<Utc>, trigger: &TriggerSpec) -> Duration {
    let target = next_trigger_after(now, trigger);
    debug!(
        "Now: {} ({}), Target: {} ({})",
        now.with_timezone(&trigger.offset),
        trigger.label,
        target,
        trigger.label
    );
    target.with_timezone(&Utc) - now
}
