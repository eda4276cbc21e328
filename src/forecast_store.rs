use anyhow::{Context as _, Result};
use std::sync::Arc;

use async_trait::async_trait;
use futures::lock::Mutex;
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use serenity::model::id::{ChannelId, GuildId};

/// 予報を投稿するチャンネルの保存先
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// サーバーのチャンネル
    async fn get_channel_id(&self, guild_id: GuildId) -> Result<Option<ChannelId>>;
    /// 登録されている全チャンネル
    async fn get_all_channel_ids(&self) -> Result<Vec<ChannelId>>;
    /// サーバーのチャンネルを設定する (`None` で解除)
    async fn set_channel_id(&self, guild_id: GuildId, channel_id: Option<ChannelId>)
        -> Result<()>;
}

/// 予報チャンネル管理クラス
pub struct ForecastStore {
    /// sql接続情報
    conn: Arc<Mutex<Connection>>,
}

impl ForecastStore {
    /// データベースを初期化する
    pub fn new(path: &str) -> Result<ForecastStore> {
        // データベースに接続
        let conn = Connection::open(path)
            .with_context(|| format!("予報データベースのオープンに失敗: {}", path))?;
        Self::init(conn)
    }

    /// メモリ上のデータベースを使う
    #[cfg(test)]
    pub fn open_in_memory() -> Result<ForecastStore> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<ForecastStore> {
        // テーブルを作成
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tenki (
                guild_id    VARCHAR(20) PRIMARY KEY,
                channel_id  VARCHAR(20)
            )",
            params!(),
        )
        .context("予報データベースの作成に失敗")?;

        Ok(ForecastStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl ChannelStore for ForecastStore {
    async fn get_channel_id(&self, guild_id: GuildId) -> Result<Option<ChannelId>> {
        let channel_id: Option<Option<String>> = self
            .conn
            .lock()
            .await
            .query_row(
                "SELECT channel_id FROM tenki WHERE guild_id = ?1",
                params!(guild_id.to_string()),
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("予報データベースの読み込みに失敗: {}", guild_id))?;
        match channel_id.flatten() {
            Some(channel_id) => Ok(Some(ChannelId(channel_id.parse()?))),
            None => Ok(None),
        }
    }

    async fn get_all_channel_ids(&self) -> Result<Vec<ChannelId>> {
        // データベースをロック
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT channel_id FROM tenki WHERE channel_id IS NOT NULL")
            .context("予報チャンネル取得用のSQL文の構築に失敗")?;
        let rows = stmt
            .query_map(params!(), |row| row.get::<_, String>(0))
            .context("予報データベースの読み込みに失敗")?;

        let mut channel_ids = Vec::new();
        for row in rows {
            // 読めない行は警告して飛ばす
            let channel_id = match row {
                Ok(channel_id) => channel_id,
                Err(why) => {
                    warn!("予報チャンネルの読み込みに失敗: {:?}", why);
                    continue;
                }
            };
            match channel_id.parse::<u64>() {
                Ok(id) => channel_ids.push(ChannelId(id)),
                Err(why) => warn!("予報チャンネルIDが不正です: {:?}: {}", channel_id, why),
            }
        }
        Ok(channel_ids)
    }

    async fn set_channel_id(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
    ) -> Result<()> {
        // データベースに書き込み
        self.conn
            .lock()
            .await
            .execute(
                "REPLACE INTO tenki (guild_id, channel_id) VALUES (?1, ?2)",
                params!(
                    guild_id.to_string(),
                    channel_id.map(|channel_id| channel_id.to_string()),
                ),
            )
            .with_context(|| {
                format!(
                    "予報データベースへの書き込みに失敗: {} -> {:?}",
                    guild_id, channel_id
                )
            })?;

        Ok(())
    }
}
