// Cookie 获取方
//
// 交互式登录不在本工具内实现，由外部程序完成后把 Cookie 交给我们。

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Cookie 获取方
#[async_trait]
pub trait CookieProvider: Send + Sync {
    /// 获取一份新的 Cookie
    async fn acquire(&self) -> Result<String>;
}

/// 运行外部命令获取 Cookie，命令的标准输出（去除首尾空白）即 Cookie
#[derive(Debug, Clone)]
pub struct CommandCookieProvider {
    program: String,
    args: Vec<String>,
}

impl CommandCookieProvider {
    /// 从 argv 构造，argv 为空时返回 None
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl CookieProvider for CommandCookieProvider {
    async fn acquire(&self) -> Result<String> {
        info!("调用外部程序获取 Cookie: {} {:?}", self.program, self.args);

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .with_context(|| format!("启动 Cookie 获取程序失败: {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Cookie 获取程序退出异常: status={}, stderr={}",
                output.status,
                stderr.trim()
            );
        }

        let cookie = String::from_utf8(output.stdout)
            .context("Cookie 获取程序输出不是合法的 UTF-8")?
            .trim()
            .to_string();
        if cookie.is_empty() {
            anyhow::bail!("Cookie 获取程序没有输出 Cookie");
        }

        debug!("外部程序返回 Cookie, 长度={}", cookie.len());
        Ok(cookie)
    }
}

/// 从环境变量读取 Cookie
#[derive(Debug, Clone)]
pub struct EnvCookieProvider {
    var: String,
}

impl EnvCookieProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CookieProvider for EnvCookieProvider {
    async fn acquire(&self) -> Result<String> {
        let cookie = std::env::var(&self.var)
            .with_context(|| format!("环境变量 {} 未设置，无法获取 Cookie", self.var))?;
        let cookie = cookie.trim().to_string();
        if cookie.is_empty() {
            anyhow::bail!("环境变量 {} 为空", self.var);
        }
        Ok(cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_empty_argv() {
        assert!(CommandCookieProvider::from_argv(&[]).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_provider_trims_stdout() {
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo '  sid=abc; uid=1  '".to_string(),
        ];
        let provider = CommandCookieProvider::from_argv(&argv).unwrap();
        assert_eq!(provider.acquire().await.unwrap(), "sid=abc; uid=1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_provider_failure() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let provider = CommandCookieProvider::from_argv(&argv).unwrap();
        assert!(provider.acquire().await.is_err());

        let argv = vec!["sh".to_string(), "-c".to_string(), "true".to_string()];
        let provider = CommandCookieProvider::from_argv(&argv).unwrap();
        assert!(provider.acquire().await.is_err());
    }

    #[tokio::test]
    async fn test_env_provider() {
        let var = "DINGTALK_HELPER_TEST_COOKIE_PROVIDER";
        std::env::set_var(var, " k=v ");
        let provider = EnvCookieProvider::new(var);
        assert_eq!(provider.acquire().await.unwrap(), "k=v");

        std::env::remove_var(var);
        assert!(provider.acquire().await.is_err());
    }
}
