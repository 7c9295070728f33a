// 配置管理模块

use crate::uploader::DEFAULT_UPLOAD_CHUNK_SIZE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 钉钉接入配置
    #[serde(default)]
    pub dingtalk: DingTalkConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 消息发送配置
    #[serde(default)]
    pub message: MessageConfig,
    /// Cookie 缓存配置
    #[serde(default)]
    pub cookie: CookieConfig,
    /// 🔥 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 钉钉接入配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DingTalkConfig {
    /// 企业 corpid
    #[serde(default)]
    pub corp_id: String,
    /// 企业 corpsecret
    #[serde(default)]
    pub corp_secret: String,
    /// 群机器人 webhook 地址
    #[serde(default)]
    pub msg_url: String,
    /// 钉盘空间ID
    #[serde(default)]
    pub space_id: String,
    /// 钉盘目标目录（不含文件名）
    #[serde(default)]
    pub space_path: String,
    /// 开放平台接口地址
    #[serde(default = "default_oapi_base")]
    pub oapi_base: String,
    /// 钉盘 Web 接口地址
    #[serde(default = "default_space_api_base")]
    pub space_api_base: String,
    /// 请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_oapi_base() -> String {
    "https://oapi.dingtalk.com".to_string()
}

fn default_space_api_base() -> String {
    "https://im.dingtalk.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for DingTalkConfig {
    fn default() -> Self {
        Self {
            corp_id: String::new(),
            corp_secret: String::new(),
            msg_url: String::new(),
            space_id: String::new(),
            space_path: String::new(),
            oapi_base: default_oapi_base(),
            space_api_base: default_space_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DingTalkConfig {
    /// 获取 access_token 需要 corpid/corpsecret
    pub fn require_corp_credentials(&self) -> Result<()> {
        if self.corp_id.trim().is_empty() || self.corp_secret.trim().is_empty() {
            anyhow::bail!("配置缺少 dingtalk.corp_id 或 dingtalk.corp_secret");
        }
        Ok(())
    }

    /// 发送消息需要 webhook 地址
    pub fn require_webhook(&self) -> Result<()> {
        if self.msg_url.trim().is_empty() {
            anyhow::bail!("配置缺少 dingtalk.msg_url");
        }
        Ok(())
    }

    /// 上传到钉盘需要空间ID
    pub fn require_space(&self) -> Result<()> {
        self.require_corp_credentials()?;
        if self.space_id.trim().is_empty() {
            anyhow::bail!("配置缺少 dingtalk.space_id");
        }
        Ok(())
    }

    /// 拼接钉盘中的目标路径: `{space_path}/{file_name}`
    pub fn space_file_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.space_path, file_name)
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 分片大小（字节），默认 1MB
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// 有分片失败时不添加到钉盘（默认关闭：只要拿到 media id 就添加）
    #[serde(default)]
    pub require_complete: bool,
}

fn default_chunk_size() -> u64 {
    DEFAULT_UPLOAD_CHUNK_SIZE
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            require_complete: false,
        }
    }
}

/// 消息发送配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    /// 发送失败后重发前的等待时间（毫秒）
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_retry_interval_ms() -> u64 {
    1000
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

/// Cookie 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Cookie 缓存文件
    #[serde(default = "default_cookie_file")]
    pub cookie_file: PathBuf,
    /// Cookie 最长使用时间（秒），默认 6.5 天
    #[serde(default = "default_cookie_max_age_secs")]
    pub max_age_secs: i64,
    /// 获取 Cookie 的外部命令（argv 形式），为空时从环境变量读取
    #[serde(default)]
    pub provider_command: Vec<String>,
    /// 未配置外部命令时读取的环境变量
    #[serde(default = "default_cookie_env_var")]
    pub env_var: String,
}

fn default_cookie_file() -> PathBuf {
    PathBuf::from("config/cookie.json")
}

fn default_cookie_max_age_secs() -> i64 {
    // 6.5 天
    3600 * 24 * 13 / 2
}

fn default_cookie_env_var() -> String {
    "DINGTALK_COOKIE".to_string()
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            cookie_file: default_cookie_file(),
            max_age_secs: default_cookie_max_age_secs(),
            provider_command: Vec::new(),
            env_var: default_cookie_env_var(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    false
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("读取配置文件失败: {}", path))?;

        let config: AppConfig = toml::from_str(&content).context("解析配置文件失败")?;
        config.validate()?;

        Ok(config)
    }

    /// 校验与具体操作无关的配置项
    pub fn validate(&self) -> Result<()> {
        if self.upload.chunk_size == 0 {
            anyhow::bail!("upload.chunk_size 必须大于 0");
        }
        if self.cookie.max_age_secs <= 0 {
            anyhow::bail!("cookie.max_age_secs 必须大于 0");
        }
        Ok(())
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("创建配置目录失败")?;
            }
        }

        fs::write(path, content).await.context("写入配置文件失败")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    ///
    /// 文件存在时必须能正确加载，否则返回错误；文件不存在时写出默认模板
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            let config = Self::load_from_file(path).await?;
            tracing::info!("配置文件加载成功: {}", path);
            return Ok(config);
        }

        tracing::warn!("配置文件不存在，使用默认配置: {}", path);
        let default_config = Self::default();

        // 首次启动写出模板，便于用户填写凭证
        if let Err(e) = default_config.save_to_file(path).await {
            tracing::error!("保存默认配置失败: {:#}", e);
        }

        Ok(default_config)
    }
}
