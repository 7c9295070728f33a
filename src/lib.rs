// DingTalk Helper Library
// 钉钉助手核心库：获取 access_token、群机器人消息、钉盘分片上传

// 认证模块（Cookie 缓存）
pub mod auth;

// 配置管理模块
pub mod config;

// 钉钉接口模块
pub mod dingtalk;

// 日志模块
pub mod logging;

// 上传引擎模块
pub mod uploader;

// 导出常用类型
pub use auth::{CommandCookieProvider, CookieProvider, CookieStore, EnvCookieProvider};
pub use config::AppConfig;
pub use dingtalk::{ApiError, DingTalkClient};
pub use uploader::{UploadEngine, UploadReport};
