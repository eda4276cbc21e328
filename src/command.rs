use anyhow::{bail, Result};
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use serenity::model::permissions::Permissions;

/// ヘルプ表示用のオプション名
pub const HELP_PARAM: &str = "help";

/// オプションの型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// 真偽値
    Boolean,
    /// テキストチャンネル
    Channel,
}

impl ParamKind {
    fn label(self) -> &'static str {
        match self {
            ParamKind::Boolean => "bool",
            ParamKind::Channel => "channel",
        }
    }
}

/// オプションの説明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDoc {
    /// オプション名
    pub name: &'static str,
    /// オプションの型
    pub kind: ParamKind,
    /// 短い説明 (スラッシュコマンド登録用)
    pub description: &'static str,
    /// ヘルプに表示する詳細
    pub details: &'static str,
    /// 必須かどうか
    pub required: bool,
}

/// コマンドの説明
///
/// スラッシュコマンドの登録とヘルプ表示の両方に使う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDoc {
    /// コマンド名
    pub name: &'static str,
    /// 短い説明
    pub description: &'static str,
    /// ヘルプに表示する詳細
    pub details: &'static str,
    /// オプション
    pub params: Vec<ParamDoc>,
}

impl CommandDoc {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            details: "",
            params: Vec::new(),
        }
    }

    pub fn details(mut self, details: &'static str) -> Self {
        self.details = details;
        self
    }

    /// 任意オプションを追加する
    pub fn param(
        mut self,
        name: &'static str,
        kind: ParamKind,
        description: &'static str,
        details: &'static str,
    ) -> Self {
        self.params.push(ParamDoc {
            name,
            kind,
            description,
            details,
            required: false,
        });
        self
    }

    /// `help` オプションを追加する
    pub fn help_param(self) -> Self {
        self.param(
            HELP_PARAM,
            ParamKind::Boolean,
            "Whether to show help instead",
            "Whether to show help instead, by default False",
        )
    }

    pub fn find_param(&self, name: &str) -> Option<&ParamDoc> {
        self.params.iter().find(|param| param.name == name)
    }

    /// ヘルプ用の文章を組み立てる
    pub fn render(&self) -> String {
        let mut text = format!("**/{}**\n{}", self.name, self.description);
        if !self.details.is_empty() {
            text.push_str("\n\n");
            text.push_str(self.details);
        }
        if !self.params.is_empty() {
            text.push_str("\n\n**Parameters**");
            for param in &self.params {
                let optional = if param.required { "" } else { ", optional" };
                let details = if param.details.is_empty() {
                    param.description
                } else {
                    param.details
                };
                text.push_str(&format!(
                    "\n`{}` ({}{})\n{}",
                    param.name,
                    param.kind.label(),
                    optional,
                    details
                ));
            }
        }
        text
    }
}

/// 埋め込みの作者欄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: Option<String>,
    pub icon_url: Option<String>,
}

/// 返信に付ける埋め込み
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyEmbed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<EmbedAuthor>,
}

/// 添付ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// プラットフォームに依存しない返信内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub content: Option<String>,
    pub embed: Option<ReplyEmbed>,
    pub attachment: Option<Attachment>,
    /// 実行者にだけ見える返信かどうか
    pub ephemeral: bool,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: ReplyEmbed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

/// コマンドの呼び出し (実行者・オプション・返信先)
#[async_trait]
pub trait Invocation: Send + Sync {
    /// 呼び出されたコマンド名
    fn command_name(&self) -> &str;
    /// 呼び出されたサーバー
    fn guild_id(&self) -> Option<GuildId>;
    /// 実行者が持っている権限
    fn granted_permissions(&self) -> Permissions;
    /// 真偽値オプション
    fn bool_option(&self, name: &str) -> Option<bool>;
    /// チャンネルオプション
    fn channel_option(&self, name: &str) -> Option<ChannelId>;

    /// ヘルプ表示が要求されているか
    fn help_requested(&self) -> bool {
        self.bool_option(HELP_PARAM).unwrap_or(false)
    }

    /// 応答を保留する (後から `respond` で返信する)
    async fn defer(&self) -> Result<()>;
    /// 返信する
    async fn respond(&self, reply: Reply) -> Result<()>;

    /// 実行の失敗を実行者に伝える
    async fn report_failure(&self, message: String) -> Result<()> {
        self.respond(Reply::text(message).ephemeral()).await
    }
}

/// 説明を持つもの
pub trait Describe {
    fn doc(&self) -> &CommandDoc;
}

/// スラッシュコマンド
#[async_trait]
pub trait Command<I: Invocation>: Describe + Send + Sync {
    async fn run(&self, invocation: &I) -> Result<()>;
}

/// 登録済みコマンドの一覧
pub struct CommandSet<I: Invocation> {
    commands: Vec<Box<dyn Command<I>>>,
}

impl<I: Invocation> Default for CommandSet<I> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

impl<I: Invocation> CommandSet<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, command: impl Command<I> + 'static) -> Self {
        self.commands.push(Box::new(command));
        self
    }

    pub fn docs(&self) -> impl Iterator<Item = &CommandDoc> {
        self.commands.iter().map(|command| command.doc())
    }

    /// 名前の一致するコマンドを実行する
    pub async fn dispatch(&self, invocation: &I) -> Result<()> {
        let name = invocation.command_name();
        match self.commands.iter().find(|command| command.doc().name == name) {
            Some(command) => command.run(invocation).await,
            None => bail!("未登録のコマンド: {}", name),
        }
    }
}
