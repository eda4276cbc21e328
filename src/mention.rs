use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// ユーザーメンション (`<@ID>` / `<@!ID>`)
static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@!?(\d+)>$").unwrap());
/// チャンネルメンション (`<#ID>`)
static CHANNEL_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<#(\d+)>$").unwrap());
/// ロールメンション (`<@&ID>`)
static ROLE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@&(\d+)>$").unwrap());

/// メンションの種類とID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mention {
    /// ユーザー
    User(String),
    /// チャンネル
    Channel(String),
    /// ロール
    Role(String),
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mention::User(id) => write!(f, "<@{}>", id),
            Mention::Channel(id) => write!(f, "<#{}>", id),
            Mention::Role(id) => write!(f, "<@&{}>", id),
        }
    }
}

fn capture_id<'t>(regex: &Regex, token: &'t str) -> Option<&'t str> {
    regex
        .captures(token)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str())
}

/// ユーザーメンションをユーザーIDに変換する (一致しなければそのまま返す)
pub fn user_from_mention(token: &str) -> &str {
    capture_id(&USER_MENTION, token).unwrap_or(token)
}

/// チャンネルメンションをチャンネルIDに変換する (一致しなければそのまま返す)
pub fn channel_from_mention(token: &str) -> &str {
    capture_id(&CHANNEL_MENTION, token).unwrap_or(token)
}

/// ロールメンションをロールIDに変換する (一致しなければそのまま返す)
pub fn role_from_mention(token: &str) -> &str {
    capture_id(&ROLE_MENTION, token).unwrap_or(token)
}

/// ユーザーIDをメンションに変換する
pub fn user_to_mention<T: fmt::Display>(user_id: Option<T>) -> Option<String> {
    user_id.map(|id| Mention::User(id.to_string()).to_string())
}

/// チャンネルIDをメンションに変換する
pub fn channel_to_mention<T: fmt::Display>(channel_id: Option<T>) -> Option<String> {
    channel_id.map(|id| Mention::Channel(id.to_string()).to_string())
}

/// ロールIDをメンションに変換する
pub fn role_to_mention<T: fmt::Display>(role_id: Option<T>) -> Option<String> {
    role_id.map(|id| Mention::Role(id.to_string()).to_string())
}
