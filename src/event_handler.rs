use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use log::{error, info};
use serenity::model::application::command::Command as ApplicationCommand;
use serenity::model::application::interaction::Interaction;
use serenity::model::gateway::Ready;

use crate::app_config::AppConfig;
use crate::command::{CommandSet, Invocation};
use crate::forecast::ForecastSource;
use crate::forecast_poster::ForecastPoster;
use crate::forecast_store::ChannelStore;
use crate::interaction::{register_command, DiscordDestination, SlashInvocation};
use crate::schedule::TriggerSpec;
use crate::tenki_command::build_commands;

use serenity::prelude::*;

/// イベント受信リスナー
pub struct Handler {
    /// 設定
    app_config: AppConfig,
    /// スラッシュコマンド
    commands: CommandSet<SlashInvocation>,
    /// 予報図の取得元
    source: Arc<dyn ForecastSource>,
    /// 予報チャンネル
    store: Arc<dyn ChannelStore>,
    /// 定期投稿の時刻
    trigger: TriggerSpec,
    /// 定期投稿を開始済みか
    poster_started: AtomicBool,
}

impl Handler {
    /// コンストラクタ
    pub fn new(
        app_config: AppConfig,
        source: Arc<dyn ForecastSource>,
        store: Arc<dyn ChannelStore>,
        trigger: TriggerSpec,
    ) -> Result<Self> {
        // コマンドの構成が不正なら起動しない
        let commands = build_commands(source.clone(), store.clone(), app_config.forecast.clone())
            .context("コマンドの構築に失敗")?;
        Ok(Self {
            app_config,
            commands,
            source,
            store,
            trigger,
            poster_started: AtomicBool::new(false),
        })
    }

    /// スラッシュコマンドを登録する
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        let registered = ApplicationCommand::set_global_application_commands(&ctx.http, |commands| {
            for doc in self.commands.docs() {
                commands.create_application_command(|command| register_command(command, doc));
            }
            commands
        })
        .await
        .context("スラッシュコマンドの登録に失敗")?;
        info!(
            "スラッシュコマンドを登録: {:?}",
            registered.iter().map(|c| &c.name).collect::<Vec<_>>()
        );
        Ok(())
    }

    /// 定期投稿を開始する
    fn start_poster(&self, ctx: Context) {
        // 再接続でreadyが再送されても二重に起動しない
        if self.poster_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let poster = ForecastPoster::new(
            self.source.clone(),
            self.store.clone(),
            DiscordDestination::new(ctx),
            self.app_config.forecast.clone(),
            self.trigger.clone(),
        );
        tokio::spawn(poster.run());
    }
}

#[async_trait]
impl EventHandler for Handler {
    /// 準備完了時に呼ばれる
    async fn ready(&self, ctx: Context, data_about_bot: Ready) {
        info!("Bot準備完了: {}", data_about_bot.user.name);

        if let Err(why) = self.register_commands(&ctx).await {
            error!("{:?}", why);
        }
        self.start_poster(ctx);
    }

    /// スラッシュコマンドが実行された時に呼び出される
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let command = match interaction {
            Interaction::ApplicationCommand(command) => command,
            _ => return,
        };
        let name = command.data.name.clone();
        info!("/{} を受信: {}", name, command.user.name);

        let invocation = SlashInvocation::new(ctx, command);
        run_command(&self.commands, &invocation).await;
    }
}

/// コマンドを実行し、失敗したら実行者に伝える
async fn run_command<I: Invocation>(commands: &CommandSet<I>, invocation: &I) {
    let name = invocation.command_name();
    match commands.dispatch(invocation).await {
        Ok(()) => info!("/{} を完了", name),
        Err(why) => {
            // エラー
            error!("/{} の実行に失敗: {:?}", name, why);
            let message = format!("Failed to run /{}.", name);
            if let Err(why) = invocation.report_failure(message).await {
                error!("エラーの通知に失敗: {:?}", why);
            }
        }
    }
}
