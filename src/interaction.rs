use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use serenity::builder::{
    CreateApplicationCommand, CreateEmbed, CreateInteractionResponseData,
    CreateInteractionResponseFollowup, CreateMessage,
};
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandDataOptionValue,
};
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::channel::{AttachmentType, ChannelType};
use serenity::model::id::{ChannelId, GuildId};
use serenity::model::permissions::Permissions;
use serenity::prelude::*;

use crate::command::{Attachment, CommandDoc, Invocation, ParamKind, Reply, ReplyEmbed};
use crate::forecast_poster::Destination;

/// スラッシュコマンドの呼び出し
pub struct SlashInvocation {
    /// コンテキスト
    ctx: Context,
    /// 受信したコマンド
    command: ApplicationCommandInteraction,
    /// 応答済み (または保留済み) かどうか
    acknowledged: AtomicBool,
    /// 保留したまま続きを返していないかどうか
    deferral_pending: AtomicBool,
}

/// 返信の送り方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// 最初の応答
    Initial,
    /// 保留中の応答を書き換える
    EditDeferred,
    /// フォローアップ
    Followup,
}

impl Route {
    fn for_reply(acknowledged: bool) -> Route {
        if acknowledged {
            Route::Followup
        } else {
            Route::Initial
        }
    }

    /// 保留中の応答があればエラー表示に置き換える
    /// (公開で保留した後の最初のフォローアップは ephemeral にできない)
    fn for_failure(acknowledged: bool, deferral_pending: bool) -> Route {
        if deferral_pending {
            Route::EditDeferred
        } else {
            Route::for_reply(acknowledged)
        }
    }
}

impl SlashInvocation {
    pub fn new(ctx: Context, command: ApplicationCommandInteraction) -> Self {
        Self {
            ctx,
            command,
            acknowledged: AtomicBool::new(false),
            deferral_pending: AtomicBool::new(false),
        }
    }

    fn route_for_reply(&self) -> Route {
        Route::for_reply(self.acknowledged.load(Ordering::SeqCst))
    }

    fn route_for_failure(&self) -> Route {
        Route::for_failure(
            self.acknowledged.load(Ordering::SeqCst),
            self.deferral_pending.load(Ordering::SeqCst),
        )
    }

    fn option(&self, name: &str) -> Option<&CommandDataOptionValue> {
        self.command
            .data
            .options
            .iter()
            .find(|option| option.name == name)
            .and_then(|option| option.resolved.as_ref())
    }
}

#[async_trait]
impl Invocation for SlashInvocation {
    fn command_name(&self) -> &str {
        &self.command.data.name
    }

    fn guild_id(&self) -> Option<GuildId> {
        self.command.guild_id
    }

    fn granted_permissions(&self) -> Permissions {
        // DMでは権限なし
        self.command
            .member
            .as_ref()
            .and_then(|member| member.permissions)
            .unwrap_or_else(Permissions::empty)
    }

    fn bool_option(&self, name: &str) -> Option<bool> {
        match self.option(name) {
            Some(CommandDataOptionValue::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    fn channel_option(&self, name: &str) -> Option<ChannelId> {
        match self.option(name) {
            Some(CommandDataOptionValue::Channel(channel)) => Some(channel.id),
            _ => None,
        }
    }

    async fn defer(&self) -> Result<()> {
        self.command
            .create_interaction_response(&self.ctx.http, |response| {
                response.kind(InteractionResponseType::DeferredChannelMessageWithSource)
            })
            .await
            .with_context(|| format!("応答の保留に失敗: /{}", self.command.data.name))?;
        self.acknowledged.store(true, Ordering::SeqCst);
        self.deferral_pending.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn respond(&self, reply: Reply) -> Result<()> {
        match self.route_for_reply() {
            Route::Initial => {
                self.command
                    .create_interaction_response(&self.ctx.http, |response| {
                        response
                            .kind(InteractionResponseType::ChannelMessageWithSource)
                            .interaction_response_data(|data| apply_response_data(data, &reply))
                    })
                    .await
                    .with_context(|| format!("返信に失敗: /{}", self.command.data.name))?;
                self.acknowledged.store(true, Ordering::SeqCst);
            }
            _ => {
                // 保留済みならフォローアップで返信
                self.command
                    .create_followup_message(&self.ctx.http, |followup| {
                        apply_followup(followup, &reply)
                    })
                    .await
                    .with_context(|| format!("返信に失敗: /{}", self.command.data.name))?;
                self.deferral_pending.store(false, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    async fn report_failure(&self, message: String) -> Result<()> {
        match self.route_for_failure() {
            Route::EditDeferred => {
                self.command
                    .edit_original_interaction_response(&self.ctx.http, |response| {
                        response.content(&message)
                    })
                    .await
                    .with_context(|| {
                        format!("保留中の応答の書き換えに失敗: /{}", self.command.data.name)
                    })?;
                self.deferral_pending.store(false, Ordering::SeqCst);
                Ok(())
            }
            _ => self.respond(Reply::text(message).ephemeral()).await,
        }
    }
}

/// チャンネルへ直接投稿する送信先
pub struct DiscordDestination {
    /// コンテキスト
    ctx: Context,
}

impl DiscordDestination {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Destination for DiscordDestination {
    async fn send(&self, channel_id: ChannelId, reply: &Reply) -> Result<()> {
        // キャッシュに無いチャンネルは削除済みとみなす
        if self.ctx.cache.guild_channel(channel_id).is_none() {
            bail!("チャンネルが見つかりません: {}", channel_id);
        }
        channel_id
            .send_message(&self.ctx, |m| apply_message(m, reply))
            .await
            .with_context(|| format!("メッセージの送信に失敗: {}", channel_id))?;
        Ok(())
    }
}

/// スラッシュコマンドを登録内容に変換する
pub fn register_command<'a>(
    builder: &'a mut CreateApplicationCommand,
    doc: &CommandDoc,
) -> &'a mut CreateApplicationCommand {
    builder.name(doc.name).description(doc.description);
    for param in &doc.params {
        builder.create_option(|option| {
            option
                .name(param.name)
                .description(param.description)
                .required(param.required);
            match param.kind {
                ParamKind::Boolean => option.kind(CommandOptionType::Boolean),
                ParamKind::Channel => option
                    .kind(CommandOptionType::Channel)
                    .channel_types(&[ChannelType::Text]),
            }
        });
    }
    builder
}

fn attachment_type<'a>(attachment: &Attachment) -> AttachmentType<'a> {
    AttachmentType::Bytes {
        data: Cow::Owned(attachment.data.clone()),
        filename: attachment.filename.clone(),
    }
}

fn apply_embed<'a>(e: &'a mut CreateEmbed, embed: &ReplyEmbed) -> &'a mut CreateEmbed {
    if let Some(title) = &embed.title {
        e.title(title);
    }
    if let Some(description) = &embed.description {
        e.description(description);
    }
    if let Some(author) = &embed.author {
        e.author(|a| {
            a.name(&author.name);
            if let Some(url) = &author.url {
                a.url(url);
            }
            if let Some(icon_url) = &author.icon_url {
                a.icon_url(icon_url);
            }
            a
        });
    }
    e
}

fn apply_response_data<'a, 'b>(
    data: &'b mut CreateInteractionResponseData<'a>,
    reply: &Reply,
) -> &'b mut CreateInteractionResponseData<'a> {
    if let Some(content) = &reply.content {
        data.content(content);
    }
    if let Some(embed) = &reply.embed {
        data.embed(|e| apply_embed(e, embed));
    }
    if let Some(attachment) = &reply.attachment {
        data.add_file(attachment_type(attachment));
    }
    data.ephemeral(reply.ephemeral)
}

fn apply_followup<'a, 'b>(
    followup: &'b mut CreateInteractionResponseFollowup<'a>,
    reply: &Reply,
) -> &'b mut CreateInteractionResponseFollowup<'a> {
    if let Some(content) = &reply.content {
        followup.content(content);
    }
    if let Some(embed) = &reply.embed {
        followup.embed(|e| apply_embed(e, embed));
    }
    if let Some(attachment) = &reply.attachment {
        followup.add_file(attachment_type(attachment));
    }
    followup.ephemeral(reply.ephemeral)
}

fn apply_message<'a, 'b>(m: &'b mut CreateMessage<'a>, reply: &Reply) -> &'b mut CreateMessage<'a> {
    if let Some(content) = &reply.content {
        m.content(content);
    }
    if let Some(embed) = &reply.embed {
        m.embed(|e| apply_embed(e, embed));
    }
    if let Some(attachment) = &reply.attachment {
        m.add_file(attachment_type(attachment));
    }
    m
}
