use anyhow::Result;
use async_trait::async_trait;
use log::info;
use serenity::model::permissions::Permissions;

use crate::command::{
    Command, CommandDoc, Describe, Invocation, ParamKind, Reply, ReplyEmbed, HELP_PARAM,
};

/// コマンドを包む時の検証エラー (起動時に発生する)
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecorationError {
    #[error("コマンド /{command} に真偽値オプション `{param}` がありません")]
    MissingParam {
        command: &'static str,
        param: &'static str,
    },
    #[error("コマンド /{command} に必要な権限が指定されていません")]
    EmptyRequirement { command: &'static str },
}

/// `help` が指定されたら実行せずにヘルプを返す
pub struct WithHelp<C> {
    inner: C,
}

/// ヘルプ表示を付ける
pub fn with_help<C: Describe>(command: C) -> Result<WithHelp<C>, DecorationError> {
    let doc = command.doc();
    match doc.find_param(HELP_PARAM) {
        Some(param) if param.kind == ParamKind::Boolean => Ok(WithHelp { inner: command }),
        _ => Err(DecorationError::MissingParam {
            command: doc.name,
            param: HELP_PARAM,
        }),
    }
}

/// ヘルプの返信
pub fn help_reply(doc: &CommandDoc) -> Reply {
    Reply::embed(ReplyEmbed {
        description: Some(doc.render()),
        ..Default::default()
    })
}

impl<C: Describe> Describe for WithHelp<C> {
    fn doc(&self) -> &CommandDoc {
        self.inner.doc()
    }
}

#[async_trait]
impl<I: Invocation, C: Command<I>> Command<I> for WithHelp<C> {
    async fn run(&self, invocation: &I) -> Result<()> {
        if invocation.help_requested() {
            info!("/{} のヘルプを表示", self.doc().name);
            return invocation.respond(help_reply(self.doc())).await;
        }
        self.inner.run(invocation).await
    }
}

/// 権限を持っていない実行者を拒否する
pub struct RequirePermission<C> {
    required: Permissions,
    inner: C,
}

/// 権限チェックを付ける
pub fn require_permission<C: Describe>(
    required: Permissions,
    command: C,
) -> Result<RequirePermission<C>, DecorationError> {
    if required.is_empty() {
        return Err(DecorationError::EmptyRequirement {
            command: command.doc().name,
        });
    }
    Ok(RequirePermission {
        required,
        inner: command,
    })
}

/// 権限不足の返信
pub fn denied_reply(required: Permissions) -> Reply {
    Reply::text(format!(
        "Privilege is required: {}.",
        required.get_permission_names().join(", ")
    ))
    .ephemeral()
}

impl<C: Describe> Describe for RequirePermission<C> {
    fn doc(&self) -> &CommandDoc {
        self.inner.doc()
    }
}

#[async_trait]
impl<I: Invocation, C: Command<I>> Command<I> for RequirePermission<C> {
    async fn run(&self, invocation: &I) -> Result<()> {
        let granted = invocation.granted_permissions();
        if !granted.contains(self.required) {
            info!(
                "/{} を拒否: 権限不足 ({:?})",
                self.doc().name,
                self.required - granted
            );
            return invocation.respond(denied_reply(self.required)).await;
        }
        self.inner.run(invocation).await
    }
}
