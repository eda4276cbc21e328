//! テスト用の偽物

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use serenity::model::permissions::Permissions;

use crate::command::{Command, CommandDoc, Describe, Invocation, Reply};
use crate::forecast::ForecastSource;

/// 返信を記録するだけの呼び出し
pub struct FakeInvocation {
    name: String,
    guild_id: Option<GuildId>,
    permissions: Permissions,
    bools: HashMap<String, bool>,
    channels: HashMap<String, ChannelId>,
    fail_respond: bool,
    deferred: AtomicBool,
    replies: Mutex<Vec<Reply>>,
}

impl FakeInvocation {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            guild_id: Some(GuildId(1)),
            permissions: Permissions::empty(),
            bools: HashMap::new(),
            channels: HashMap::new(),
            fail_respond: false,
            deferred: AtomicBool::new(false),
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn with_guild(mut self, guild_id: Option<GuildId>) -> Self {
        self.guild_id = guild_id;
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_bool(mut self, name: &str, value: bool) -> Self {
        self.bools.insert(name.to_string(), value);
        self
    }

    pub fn with_channel(mut self, name: &str, channel_id: ChannelId) -> Self {
        self.channels.insert(name.to_string(), channel_id);
        self
    }

    pub fn failing_respond(mut self) -> Self {
        self.fail_respond = true;
        self
    }

    pub fn deferred(&self) -> bool {
        self.deferred.load(Ordering::SeqCst)
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Invocation for FakeInvocation {
    fn command_name(&self) -> &str {
        &self.name
    }

    fn guild_id(&self) -> Option<GuildId> {
        self.guild_id
    }

    fn granted_permissions(&self) -> Permissions {
        self.permissions
    }

    fn bool_option(&self, name: &str) -> Option<bool> {
        self.bools.get(name).copied()
    }

    fn channel_option(&self, name: &str) -> Option<ChannelId> {
        self.channels.get(name).copied()
    }

    async fn defer(&self) -> Result<()> {
        self.deferred.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn respond(&self, reply: Reply) -> Result<()> {
        if self.fail_respond {
            bail!("respond failed");
        }
        self.replies.lock().unwrap().push(reply);
        Ok(())
    }
}

/// 呼ばれた回数を数えるコマンド
pub struct CountingCommand {
    doc: CommandDoc,
    calls: AtomicUsize,
    error: Option<fn() -> anyhow::Error>,
}

impl CountingCommand {
    pub fn new(doc: CommandDoc) -> Self {
        Self {
            doc,
            calls: AtomicUsize::new(0),
            error: None,
        }
    }

    pub fn failing(doc: CommandDoc, error: fn() -> anyhow::Error) -> Self {
        Self {
            error: Some(error),
            ..Self::new(doc)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Describe for CountingCommand {
    fn doc(&self) -> &CommandDoc {
        &self.doc
    }
}

#[async_trait]
impl<I: Invocation> Command<I> for CountingCommand {
    async fn run(&self, invocation: &I) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.error {
            return Err(error());
        }
        invocation
            .respond(Reply::text(format!("{} ran", self.doc.name)))
            .await
    }
}

/// 決まった画像を返す予報元
pub struct FakeSource {
    image: Vec<u8>,
    fail: bool,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new(image: &[u8]) -> Self {
        Self {
            image: image.to_vec(),
            fail: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(b"")
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastSource for FakeSource {
    async fn fetch_image(&self) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("screenshot failed");
        }
        Ok(self.image.clone())
    }
}
