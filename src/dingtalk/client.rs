// 钉钉客户端实现

use crate::config::DingTalkConfig;
use crate::dingtalk::constants::*;
use crate::dingtalk::{
    ApiError, RobotResponse, SpaceAddRequest, SpaceAddResponse, TextMessage, TokenResponse,
    UploadChunkResponse, UploadCreateResponse,
};
use crate::uploader::UploadChunk;
use anyhow::{Context, Result};
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, ORIGIN, REFERER,
};
use reqwest::multipart;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 钉钉客户端
#[derive(Debug, Clone)]
pub struct DingTalkClient {
    /// HTTP客户端
    client: Client,
    /// 接入配置
    config: DingTalkConfig,
    /// 消息发送失败后重发的间隔
    retry_interval: Duration,
}

impl DingTalkClient {
    /// 创建新的钉钉客户端
    pub fn new(config: DingTalkConfig, retry_interval: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            retry_interval,
        })
    }

    pub fn config(&self) -> &DingTalkConfig {
        &self.config
    }

    fn oapi_url(&self, path: &str) -> String {
        format!("{}{}", self.config.oapi_base.trim_end_matches('/'), path)
    }

    // =====================================================
    // 鉴权
    // =====================================================

    /// 获取企业 access_token
    pub async fn get_access_token(&self) -> Result<String> {
        let url = format!(
            "{}?corpid={}&corpsecret={}",
            self.oapi_url("/gettoken"),
            urlencoding::encode(&self.config.corp_id),
            urlencoding::encode(&self.config.corp_secret)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("获取 access_token 请求发送失败")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("读取 access_token 响应失败")?;
        debug!("gettoken 响应: status={}", status);

        let token_response: TokenResponse = serde_json::from_str(&response_text)
            .with_context(|| format!("解析 access_token 响应失败: body={}", response_text))?;

        if !token_response.is_success() {
            error!(
                "获取 access_token 失败: errcode={}, errmsg={}",
                token_response.errcode, token_response.errmsg
            );
            return Err(ApiError::Token {
                errcode: token_response.errcode,
                errmsg: token_response.errmsg,
            }
            .into());
        }

        info!(
            "获取 access_token 成功, 有效期 {} 秒",
            token_response.expires_in
        );
        Ok(token_response.access_token)
    }

    // =====================================================
    // 群机器人消息
    // =====================================================

    /// 发送文本消息
    ///
    /// 接口返回 errmsg != "ok" 时原样重发，直到成功为止；网络错误直接返回。
    ///
    /// # 返回
    /// 发送次数
    pub async fn send_text(&self, content: &str, at_all: bool) -> Result<u32> {
        let message = TextMessage::new(content, at_all);
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(&self.config.msg_url)
                .header(CONTENT_TYPE, "application/json")
                .header("charset", "utf-8")
                .json(&message)
                .send()
                .await
                .context("发送消息请求失败")?;

            let response_text = response.text().await.context("读取消息响应失败")?;
            let robot_response: RobotResponse = serde_json::from_str(&response_text)
                .with_context(|| format!("解析消息响应失败: body={}", response_text))?;

            if robot_response.is_success() {
                info!("消息发送成功 (第 {} 次)", attempts);
                return Ok(attempts);
            }

            warn!(
                "消息发送失败 (第 {} 次): errcode={}, errmsg={}，{}ms 后重发",
                attempts,
                robot_response.errcode,
                robot_response.errmsg,
                self.retry_interval.as_millis()
            );
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    // =====================================================
    // 分片上传
    // =====================================================

    /// 开启分片上传事务
    ///
    /// # 返回
    /// uploadid
    pub async fn create_upload_session(&self, access_token: &str, size: u64) -> Result<String> {
        let url = format!(
            "{}?access_token={}&size={}",
            self.oapi_url("/file/upload/create"),
            urlencoding::encode(access_token),
            size
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("获取 uploadid 请求发送失败")?;

        let response_text = response.text().await.context("读取 uploadid 响应失败")?;
        debug!("file/upload/create 响应: {}", response_text);

        let create_response: UploadCreateResponse = serde_json::from_str(&response_text)
            .with_context(|| format!("解析 uploadid 响应失败: body={}", response_text))?;

        if !create_response.is_success() || create_response.uploadid.is_empty() {
            error!(
                "获取 uploadid 失败: code={}, message={}",
                create_response.code_str(),
                create_response.message
            );
            return Err(ApiError::UploadSession {
                code: create_response.code_str(),
                message: create_response.message,
            }
            .into());
        }

        info!("获取 uploadid 成功: {}", create_response.uploadid);
        Ok(create_response.uploadid)
    }

    /// 上传分片
    ///
    /// # 返回
    /// 响应中的 filepath（最后一个分片时为 media id，其余分片通常为空）
    pub async fn upload_chunk(
        &self,
        access_token: &str,
        upload_id: &str,
        chunk: &UploadChunk,
        data: Vec<u8>,
    ) -> Result<String> {
        let url = format!(
            "{}?access_token={}&uploadid={}",
            self.oapi_url("/file/upload"),
            urlencoding::encode(access_token),
            urlencoding::encode(upload_id)
        );

        let part = multipart::Part::bytes(data)
            .file_name(CHUNK_FILE_NAME)
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .header(ND_PARTITION_HEADER, chunk.nd_partition())
            .multipart(form)
            .send()
            .await
            .context("上传分片请求发送失败")?;

        let status = response.status();
        let response_text = response.text().await.context("读取上传分片响应失败")?;

        debug!(
            "上传分片响应: part={}, status={}, body={}",
            chunk.index, status, response_text
        );

        let chunk_response: UploadChunkResponse = serde_json::from_str(&response_text)
            .with_context(|| {
                format!(
                    "解析上传分片响应失败: status={}, body={}",
                    status, response_text
                )
            })?;

        if !chunk_response.is_success() {
            return Err(ApiError::Chunk {
                index: chunk.index,
                code: chunk_response.code_str(),
                message: chunk_response.message,
            }
            .into());
        }

        Ok(chunk_response.filepath)
    }

    // =====================================================
    // 钉盘
    // =====================================================

    /// 将上传好的文件添加到钉盘
    ///
    /// # 参数
    /// * `cookie` - 网页版登录 Cookie
    /// * `media_id` - 分片上传完成后得到的 filepath
    /// * `space_path` - 钉盘中的完整路径（含文件名）
    ///
    /// # 返回
    /// 接口是否返回 success
    pub async fn add_file_to_space(
        &self,
        access_token: &str,
        cookie: &str,
        media_id: &str,
        space_id: &str,
        space_path: &str,
    ) -> Result<bool> {
        let base = self.config.space_api_base.trim_end_matches('/');
        let url = format!(
            "{}/v1/space/file/add?access_token={}",
            base,
            urlencoding::encode(access_token)
        );

        let body = SpaceAddRequest::new(space_id, space_path, media_id);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, SPACE_ACCEPT)
            .header(ACCEPT_ENCODING, SPACE_ACCEPT_ENCODING)
            .header(ACCEPT_LANGUAGE, SPACE_ACCEPT_LANGUAGE)
            .header(COOKIE, cookie)
            .header(ORIGIN, base)
            .header(REFERER, format!("{}/{}", base, SPACE_REFERER_QUERY))
            .json(&body)
            .send()
            .await
            .context("添加文件到钉盘请求发送失败")?;

        let status = response.status();
        let response_text = response.text().await.context("读取钉盘响应失败")?;
        debug!("space/file/add 响应: status={}, body={}", status, response_text);

        let add_response: SpaceAddResponse = serde_json::from_str(&response_text)
            .with_context(|| format!("解析钉盘响应失败: status={}, body={}", status, response_text))?;

        if add_response.success {
            info!("添加文件到钉盘成功: {}", space_path);
        } else {
            error!("添加文件到钉盘失败: status={}, body={}", status, response_text);
        }

        Ok(add_response.success)
    }
}
