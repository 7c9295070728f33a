// 钉钉接口数据类型

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 文件上传接口的 `code` 字段，服务端返回字符串 `"0"`，也兼容数字
fn code_is_zero(code: &Value) -> bool {
    match code {
        Value::String(s) => s == "0",
        Value::Number(n) => n.as_i64() == Some(0),
        _ => false,
    }
}

fn code_to_string(code: &Value) -> String {
    match code {
        Value::String(s) => s.clone(),
        Value::Null => "<missing>".to_string(),
        other => other.to_string(),
    }
}

/// gettoken 响应
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// 错误码（0表示成功）
    #[serde(default)]
    pub errcode: i64,

    /// 错误信息，成功时为 "ok"
    #[serde(default)]
    pub errmsg: String,

    #[serde(default)]
    pub access_token: String,

    /// 有效期（秒）
    #[serde(default)]
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn is_success(&self) -> bool {
        self.errmsg == "ok"
    }
}

/// 群机器人文本消息
#[derive(Debug, Clone, Serialize)]
pub struct TextMessage {
    pub msgtype: &'static str,
    pub text: TextContent,
    pub at: AtTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtTarget {
    #[serde(rename = "isAtAll")]
    pub is_at_all: bool,
}

impl TextMessage {
    pub fn new(content: impl Into<String>, at_all: bool) -> Self {
        Self {
            msgtype: "text",
            text: TextContent {
                content: content.into(),
            },
            at: AtTarget { is_at_all: at_all },
        }
    }
}

/// 群机器人响应
#[derive(Debug, Deserialize)]
pub struct RobotResponse {
    #[serde(default)]
    pub errcode: i64,

    #[serde(default)]
    pub errmsg: String,
}

impl RobotResponse {
    pub fn is_success(&self) -> bool {
        self.errmsg == "ok"
    }
}

/// file/upload/create 响应
#[derive(Debug, Deserialize)]
pub struct UploadCreateResponse {
    #[serde(default)]
    pub code: Value,

    #[serde(default)]
    pub uploadid: String,

    #[serde(default, alias = "msg")]
    pub message: String,
}

impl UploadCreateResponse {
    pub fn is_success(&self) -> bool {
        code_is_zero(&self.code)
    }

    pub fn code_str(&self) -> String {
        code_to_string(&self.code)
    }
}

/// file/upload 响应
///
/// 最后一个分片上传成功后 `filepath` 即为文件的 media id
#[derive(Debug, Deserialize)]
pub struct UploadChunkResponse {
    #[serde(default)]
    pub code: Value,

    #[serde(default)]
    pub filepath: String,

    #[serde(default, alias = "msg")]
    pub message: String,
}

impl UploadChunkResponse {
    pub fn is_success(&self) -> bool {
        code_is_zero(&self.code)
    }

    pub fn code_str(&self) -> String {
        code_to_string(&self.code)
    }
}

/// 添加文件到钉盘的请求体
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceAddRequest {
    /// 同名时自动重命名
    pub auto_rename: bool,
    pub from_im: bool,
    pub notification: bool,
    /// 钉盘中的完整路径
    pub path: String,
    pub space_id: String,
    /// 上传得到的 media id
    pub temp_url: String,
}

impl SpaceAddRequest {
    pub fn new(space_id: &str, path: &str, media_id: &str) -> Self {
        Self {
            auto_rename: true,
            from_im: false,
            notification: false,
            path: path.to_string(),
            space_id: space_id.to_string(),
            temp_url: media_id.to_string(),
        }
    }
}

/// 添加文件到钉盘的响应
#[derive(Debug, Deserialize)]
pub struct SpaceAddResponse {
    #[serde(default)]
    pub success: bool,
}
