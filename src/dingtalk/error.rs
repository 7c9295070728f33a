// 钉钉接口业务错误

use thiserror::Error;

/// 接口返回了非成功结果
#[derive(Debug, Error)]
pub enum ApiError {
    /// 获取 access_token 失败
    #[error("获取 access_token 失败: errcode={errcode}, errmsg={errmsg}")]
    Token { errcode: i64, errmsg: String },

    /// 创建上传事务失败
    #[error("获取 uploadid 失败: code={code}, message={message}")]
    UploadSession { code: String, message: String },

    /// 分片上传失败
    #[error("上传分片 #{index} 失败: code={code}, message={message}")]
    Chunk {
        index: usize,
        code: String,
        message: String,
    },
}
