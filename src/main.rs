use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dingtalk_helper::auth::CookieState;
use dingtalk_helper::config::{LogConfig, DEFAULT_CONFIG_PATH};
use dingtalk_helper::{
    logging, AppConfig, CommandCookieProvider, CookieProvider, CookieStore, DingTalkClient,
    EnvCookieProvider, UploadEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 钉钉助手：消息通知与钉盘上传
#[derive(Debug, Parser)]
#[command(name = "dingtalk-helper")]
#[command(about = "DingTalk helper: robot notifications and chunked uploads to DingTalk space", long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 获取并打印 access_token
    Token,

    /// 通过群机器人发送文本消息（失败时持续重发）
    Send {
        /// 消息内容
        text: String,
        /// @所有人
        #[arg(long)]
        at_all: bool,
    },

    /// 上传文件到钉盘
    Upload {
        /// 本地文件
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// 管理 Cookie 缓存
    Cookie {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Debug, Subcommand)]
enum CookieAction {
    /// 查看缓存状态
    Status,
    /// 强制重新获取
    Renew,
}

/// 根据配置选择 Cookie 获取方：优先外部命令，其次环境变量
fn build_cookie_provider(config: &AppConfig) -> Arc<dyn CookieProvider> {
    match CommandCookieProvider::from_argv(&config.cookie.provider_command) {
        Some(provider) => Arc::new(provider),
        None => Arc::new(EnvCookieProvider::new(config.cookie.env_var.clone())),
    }
}

fn build_client(config: &AppConfig) -> Result<DingTalkClient> {
    DingTalkClient::new(
        config.dingtalk.clone(),
        Duration::from_millis(config.message.retry_interval_ms),
    )
}

async fn run(cli: Cli, config: AppConfig) -> Result<bool> {
    match cli.command {
        Command::Token => {
            config.dingtalk.require_corp_credentials()?;
            let token = build_client(&config)?.get_access_token().await?;
            println!("{}", token);
            Ok(true)
        }
        Command::Send { text, at_all } => {
            config.dingtalk.require_webhook()?;
            build_client(&config)?.send_text(&text, at_all).await?;
            Ok(true)
        }
        Command::Upload { files } => {
            config.dingtalk.require_space()?;
            let engine = UploadEngine::new(
                build_client(&config)?,
                CookieStore::from_config(&config.cookie),
                build_cookie_provider(&config),
                config.upload.chunk_size,
            )
            .require_complete(config.upload.require_complete);

            let mut all_ok = true;
            for file in &files {
                match engine.upload_file(file).await {
                    Ok(report) if report.is_success() => {
                        if !report.failed_chunks.is_empty() {
                            warn!(
                                "已添加到钉盘，但有分片上传失败: {:?}, 失败分片={:?}",
                                file, report.failed_chunks
                            );
                        }
                        println!("{} -> {}", file.display(), report.space_path);
                    }
                    Ok(report) => {
                        all_ok = false;
                        error!(
                            "上传未完成: {:?}, 失败分片={:?}, media_id={:?}",
                            file, report.failed_chunks, report.media_id
                        );
                    }
                    Err(e) => {
                        all_ok = false;
                        error!("上传失败: {:?}: {:#}", file, e);
                    }
                }
            }
            Ok(all_ok)
        }
        Command::Cookie { action } => {
            let store = CookieStore::from_config(&config.cookie);
            match action {
                CookieAction::Status => {
                    let now = chrono::Utc::now().timestamp();
                    let state = store.load_state(now).await;
                    match &state {
                        CookieState::Missing => println!("missing: {}", store.path().display()),
                        CookieState::Fresh(record) => {
                            println!("fresh: age={}s", record.age(now))
                        }
                        CookieState::Stale(record) => {
                            println!("stale: age={}s", record.age(now))
                        }
                    }
                    if state.needs_renewal() {
                        println!("下次上传时将自动续期，或执行 `cookie renew`");
                    }
                }
                CookieAction::Renew => {
                    let provider = build_cookie_provider(&config);
                    store
                        .renew(provider.as_ref())
                        .await
                        .context("Cookie 续期失败")?;
                    println!("renewed: {}", store.path().display());
                }
            }
            Ok(true)
        }
    }
}

/// 加载日志配置
///
/// 日志系统初始化之前读取，失败时使用默认配置
async fn load_log_config(path: &str) -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(path).await {
        if let Ok(config) = toml::from_str::<AppConfig>(&content) {
            return config.log;
        }
    }
    LogConfig::default()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 🔥 初始化日志系统（必须保持 log_guard 存活）
    let log_config = load_log_config(&cli.config).await;
    let log_guard = logging::init_logging(&log_config);

    let config = AppConfig::load_or_default(&cli.config)
        .await
        .with_context(|| format!("加载配置失败: {}", cli.config))?;
    info!("dingtalk-helper v{} 启动", env!("CARGO_PKG_VERSION"));

    let ok = run(cli, config).await?;

    // exit 不会执行析构，先刷新日志
    drop(log_guard);
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
