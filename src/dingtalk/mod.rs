// 钉钉开放平台 / 钉盘接口模块

pub mod client;
pub mod constants;
pub mod error;
pub mod types;

pub use client::DingTalkClient;
pub use error::ApiError;
pub use types::*;
