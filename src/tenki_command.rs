use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use log::info;
use serenity::model::permissions::Permissions;

use crate::app_config::ForecastConfig;
use crate::command::{Command, CommandDoc, CommandSet, Describe, Invocation, ParamKind, Reply};
use crate::forecast::{forecast_reply, ForecastSource};
use crate::forecast_store::ChannelStore;
use crate::mention::channel_to_mention;
use crate::middleware::{require_permission, with_help, DecorationError};

/// 予報チャンネルのオプション名
const TENKI_PARAM: &str = "tenki";

/// `/tenki`: 予報図をすぐに投稿する
pub struct TenkiCommand {
    doc: CommandDoc,
    source: Arc<dyn ForecastSource>,
    config: ForecastConfig,
}

impl TenkiCommand {
    pub fn new(source: Arc<dyn ForecastSource>, config: ForecastConfig) -> Self {
        Self {
            doc: CommandDoc::new("tenki", "Post weather forecast of tenki.jp.").help_param(),
            source,
            config,
        }
    }
}

impl Describe for TenkiCommand {
    fn doc(&self) -> &CommandDoc {
        &self.doc
    }
}

#[async_trait]
impl<I: Invocation> Command<I> for TenkiCommand {
    async fn run(&self, invocation: &I) -> Result<()> {
        // スクリーンショットに時間がかかるので先に応答を保留する
        invocation.defer().await?;
        let image = self
            .source
            .fetch_image()
            .await
            .context("予報図の取得に失敗")?;
        invocation
            .respond(forecast_reply(image, &self.config))
            .await
    }
}

/// `/settenki`: 予報を投稿するチャンネルを設定する
pub struct SetTenkiCommand {
    doc: CommandDoc,
    store: Arc<dyn ChannelStore>,
}

impl SetTenkiCommand {
    pub fn new(store: Arc<dyn ChannelStore>) -> Self {
        Self {
            doc: CommandDoc::new("settenki", "Change #Tenki.")
                .details("Privilege of administrator is required.")
                .param(
                    TENKI_PARAM,
                    ParamKind::Channel,
                    "Weather forecast channel, empty for disable.",
                    "Channel to set as #Tenki, by default None\n\
                     #Tenki is weather forecast channel.\n\
                     If #Tenki is not None, post weather forecast of tenki.jp to #Tenki on 5:00 JST.",
                )
                .help_param(),
            store,
        }
    }
}

impl Describe for SetTenkiCommand {
    fn doc(&self) -> &CommandDoc {
        &self.doc
    }
}

#[async_trait]
impl<I: Invocation> Command<I> for SetTenkiCommand {
    async fn run(&self, invocation: &I) -> Result<()> {
        let guild_id = match invocation.guild_id() {
            Some(guild_id) => guild_id,
            None => {
                return invocation
                    .respond(Reply::text("This command is only available in a server.").ephemeral())
                    .await
            }
        };
        let channel_id = invocation.channel_option(TENKI_PARAM);

        let previous = self.store.get_channel_id(guild_id).await?;
        self.store
            .set_channel_id(guild_id, channel_id)
            .await
            .context("#Tenkiの更新に失敗")?;
        info!(
            "#Tenkiを変更: サーバー {}: {:?} -> {:?}",
            guild_id, previous, channel_id
        );

        let mention = channel_to_mention(channel_id).unwrap_or_else(|| "None".to_string());
        invocation
            .respond(Reply::text(format!("#Tenki is changed to {}.", mention)))
            .await
    }
}

/// Botのコマンド一覧を組み立てる
///
/// ヘルプ表示が一番外側、その内側で権限チェックを行う。
pub fn build_commands<I: Invocation + 'static>(
    source: Arc<dyn ForecastSource>,
    store: Arc<dyn ChannelStore>,
    config: ForecastConfig,
) -> Result<CommandSet<I>, DecorationError> {
    Ok(CommandSet::new()
        .add(with_help(TenkiCommand::new(source, config))?)
        .add(with_help(require_permission(
            Permissions::ADMINISTRATOR,
            SetTenkiCommand::new(store),
        )?)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast_store::ForecastStore;
    use crate::middleware::{denied_reply, help_reply};
    use crate::testing::{FakeInvocation, FakeSource};
    use serenity::model::id::{ChannelId, GuildId};

    struct Bot {
        commands: CommandSet<FakeInvocation>,
        source: Arc<FakeSource>,
        store: Arc<ForecastStore>,
    }

    fn bot_with(source: FakeSource) -> Bot {
        let source = Arc::new(source);
        let store = Arc::new(ForecastStore::open_in_memory().unwrap());
        let commands =
            build_commands(source.clone(), store.clone(), ForecastConfig::default()).unwrap();
        Bot {
            commands,
            source,
            store,
        }
    }

    fn bot() -> Bot {
        bot_with(FakeSource::new(b"\x89PNG"))
    }

    #[test]
    fn registers_both_commands_with_help() {
        let bot = bot();
        let docs = bot.commands.docs().collect::<Vec<_>>();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, "tenki");
        assert_eq!(docs[1].name, "settenki");
        assert!(docs.iter().all(|doc| doc.find_param("help").is_some()));
        assert_eq!(
            docs[1].find_param("tenki").unwrap().kind,
            ParamKind::Channel
        );
    }

    #[tokio::test]
    async fn tenki_defers_then_posts_the_image() {
        let bot = bot();
        let invocation = FakeInvocation::new("tenki");

        bot.commands.dispatch(&invocation).await.unwrap();

        assert!(invocation.deferred());
        assert_eq!(bot.source.fetches(), 1);
        let replies = invocation.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0].attachment.as_ref().unwrap().data,
            b"\x89PNG".to_vec()
        );
    }

    #[tokio::test]
    async fn tenki_help_does_not_fetch() {
        let bot = bot();
        let invocation = FakeInvocation::new("tenki").with_bool("help", true);

        bot.commands.dispatch(&invocation).await.unwrap();

        assert_eq!(bot.source.fetches(), 0);
        assert!(!invocation.deferred());
        let replies = invocation.replies();
        assert_eq!(replies.len(), 1);
        let description = replies[0]
            .embed
            .as_ref()
            .and_then(|embed| embed.description.clone())
            .unwrap();
        assert!(description.starts_with("**/tenki**\nPost weather forecast of tenki.jp."));
    }

    #[tokio::test]
    async fn tenki_fetch_failure_is_returned() {
        let bot = bot_with(FakeSource::failing());
        let invocation = FakeInvocation::new("tenki");

        assert!(bot.commands.dispatch(&invocation).await.is_err());
        assert!(invocation.replies().is_empty());
    }

    #[tokio::test]
    async fn settenki_requires_administrator() {
        let bot = bot();
        let invocation = FakeInvocation::new("settenki")
            .with_permissions(Permissions::MANAGE_CHANNELS)
            .with_channel("tenki", ChannelId(10));

        bot.commands.dispatch(&invocation).await.unwrap();

        assert_eq!(
            invocation.replies(),
            vec![denied_reply(Permissions::ADMINISTRATOR)]
        );
        assert_eq!(bot.store.get_channel_id(GuildId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn settenki_help_is_shown_to_anyone() {
        let bot = bot();
        let invocation = FakeInvocation::new("settenki").with_bool("help", true);

        bot.commands.dispatch(&invocation).await.unwrap();

        let replies = invocation.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0], help_reply(&SetTenkiCommand::new(bot.store.clone()).doc));
    }

    #[tokio::test]
    async fn settenki_stores_and_confirms_channel() {
        let bot = bot();
        let invocation = FakeInvocation::new("settenki")
            .with_permissions(Permissions::ADMINISTRATOR)
            .with_channel("tenki", ChannelId(10));

        bot.commands.dispatch(&invocation).await.unwrap();

        assert_eq!(
            invocation.replies(),
            vec![Reply::text("#Tenki is changed to <#10>.")]
        );
        assert_eq!(
            bot.store.get_channel_id(GuildId(1)).await.unwrap(),
            Some(ChannelId(10))
        );
    }

    #[tokio::test]
    async fn settenki_without_channel_clears_it() {
        let bot = bot();
        bot.store
            .set_channel_id(GuildId(1), Some(ChannelId(10)))
            .await
            .unwrap();
        let invocation =
            FakeInvocation::new("settenki").with_permissions(Permissions::ADMINISTRATOR);

        bot.commands.dispatch(&invocation).await.unwrap();

        assert_eq!(
            invocation.replies(),
            vec![Reply::text("#Tenki is changed to None.")]
        );
        assert!(bot.store.get_all_channel_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settenki_outside_a_server_is_refused() {
        let bot = bot();
        let invocation = FakeInvocation::new("settenki")
            .with_guild(None)
            .with_permissions(Permissions::ADMINISTRATOR)
            .with_channel("tenki", ChannelId(10));

        bot.commands.dispatch(&invocation).await.unwrap();

        let replies = invocation.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].ephemeral);
        assert!(bot.store.get_all_channel_ids().await.unwrap().is_empty());
    }
}
