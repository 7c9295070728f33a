// Cookie 缓存
//
// 状态机: 加载缓存 -> (Missing | Stale) -> 续期并写回 / Fresh -> 直接使用

use crate::auth::{CookieProvider, CookieRecord, CookieState};
use crate::config::CookieConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Cookie 缓存文件管理
#[derive(Debug, Clone)]
pub struct CookieStore {
    /// 缓存文件路径
    path: PathBuf,
    /// 最长使用时间（秒）
    max_age_secs: i64,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>, max_age_secs: i64) -> Self {
        Self {
            path: path.into(),
            max_age_secs,
        }
    }

    pub fn from_config(config: &CookieConfig) -> Self {
        Self::new(config.cookie_file.clone(), config.max_age_secs)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取缓存并判定状态
    ///
    /// 文件不存在、无法读取或内容损坏都视为 `Missing`
    pub async fn load_state(&self, now: i64) -> CookieState {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("读取 Cookie 缓存失败: {:?}, 错误: {}", self.path, e);
                return CookieState::Missing;
            }
        };

        match serde_json::from_str::<CookieRecord>(&content) {
            Ok(record) => CookieState::classify(record, now, self.max_age_secs),
            Err(e) => {
                warn!("Cookie 缓存文件已损坏，将重新获取: {:?}, 错误: {}", self.path, e);
                CookieState::Missing
            }
        }
    }

    /// 获取可用的 Cookie，必要时续期
    pub async fn ensure_cookie(&self, provider: &dyn CookieProvider) -> Result<String> {
        self.ensure_cookie_at(provider, chrono::Utc::now().timestamp())
            .await
    }

    pub async fn ensure_cookie_at(
        &self,
        provider: &dyn CookieProvider,
        now: i64,
    ) -> Result<String> {
        match self.load_state(now).await {
            CookieState::Fresh(record) => {
                debug!(
                    "使用缓存的 Cookie, 已使用 {} 秒 (上限 {} 秒)",
                    record.age(now),
                    self.max_age_secs
                );
                Ok(record.cookie)
            }
            CookieState::Stale(record) => {
                info!(
                    "Cookie 已使用 {} 秒，超过上限 {} 秒，开始续期",
                    record.age(now),
                    self.max_age_secs
                );
                Ok(self.renew_at(provider, now).await?.cookie)
            }
            CookieState::Missing => {
                info!("没有可用的 Cookie 缓存，开始获取");
                Ok(self.renew_at(provider, now).await?.cookie)
            }
        }
    }

    /// 强制续期
    pub async fn renew(&self, provider: &dyn CookieProvider) -> Result<CookieRecord> {
        self.renew_at(provider, chrono::Utc::now().timestamp()).await
    }

    pub async fn renew_at(&self, provider: &dyn CookieProvider, now: i64) -> Result<CookieRecord> {
        let cookie = provider.acquire().await.context("获取 Cookie 失败")?;
        let record = CookieRecord::new(cookie, now);
        self.persist(&record).await?;
        info!("Cookie 已续期并写入缓存: {:?}", self.path);
        Ok(record)
    }

    /// 写入缓存文件
    pub async fn persist(&self, record: &CookieRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("创建 Cookie 缓存目录失败: {:?}", parent))?;
            }
        }

        let content = serde_json::to_string(record).context("序列化 Cookie 缓存失败")?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("写入 Cookie 缓存失败: {:?}", self.path))?;
        Ok(())
    }
}
