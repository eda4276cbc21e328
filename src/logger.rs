use anyhow::{anyhow, Result};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

/// ログ出力の書式
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";

/// ログ出力を初期化する
pub fn init_logger(level: &str) -> Result<()> {
    let config = build_config(level)?;
    log4rs::init_config(config)?;
    Ok(())
}

fn build_config(level: &str) -> Result<Config> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| anyhow!("ログレベルが不正です: {}", level))?;

    // コンソールへ出力
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        // 依存クレートの詳細ログは抑える
        .logger(Logger::builder().build("rustls", LevelFilter::Warn))
        .logger(Logger::builder().build("reqwest", LevelFilter::Warn))
        .build(Root::builder().appender("stdout").build(level))?;
    Ok(config)
}
