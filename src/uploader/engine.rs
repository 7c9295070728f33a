// 上传引擎
//
// 上传流程：
// 1. 获取 access_token
// 2. 开启上传事务，拿到 uploadid
// 3. 按顺序逐个上传分片，失败的分片记录下来并继续后续分片
// 4. 最后一个分片返回的 filepath 即 media id
// 5. 拿到 media id 后确保 Cookie 有效，把文件添加到钉盘
//    （中间分片失败只记录在结果中；开启 require_complete 时不添加）

use crate::auth::{CookieProvider, CookieStore};
use crate::dingtalk::DingTalkClient;
use crate::uploader::UploadChunkManager;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 单个文件的上传结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// 文件大小
    pub file_size: u64,
    /// 分片总数
    pub total_chunks: usize,
    /// 上传失败的分片索引
    pub failed_chunks: Vec<usize>,
    /// 最后一个分片返回的 media id
    pub media_id: Option<String>,
    /// 钉盘中的目标路径
    pub space_path: String,
    /// 是否已添加到钉盘
    pub attached: bool,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.attached
    }
}

/// 上传引擎
pub struct UploadEngine {
    /// 钉钉客户端
    client: DingTalkClient,
    /// Cookie 缓存
    cookie_store: CookieStore,
    /// Cookie 获取方
    cookie_provider: Arc<dyn CookieProvider>,
    /// 分片大小
    chunk_size: u64,
    /// 有分片失败时不添加到钉盘
    require_complete: bool,
}

impl UploadEngine {
    pub fn new(
        client: DingTalkClient,
        cookie_store: CookieStore,
        cookie_provider: Arc<dyn CookieProvider>,
        chunk_size: u64,
    ) -> Self {
        Self {
            client,
            cookie_store,
            cookie_provider,
            chunk_size,
            require_complete: false,
        }
    }

    /// 设置是否要求全部分片成功才添加到钉盘
    pub fn require_complete(mut self, require_complete: bool) -> Self {
        self.require_complete = require_complete;
        self
    }

    /// 上传文件到钉盘
    pub async fn upload_file(&self, file_path: &Path) -> Result<UploadReport> {
        info!("开始上传文件: {:?}", file_path);

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("无法获取文件名: {:?}", file_path))?
            .to_string();
        let space_path = self.client.config().space_file_path(&file_name);

        let access_token = self.client.get_access_token().await?;

        let metadata = tokio::fs::metadata(file_path)
            .await
            .with_context(|| format!("读取文件信息失败: {:?}", file_path))?;
        if !metadata.is_file() {
            anyhow::bail!("不是普通文件: {:?}", file_path);
        }
        let file_size = metadata.len();
        info!("文件大小: {} bytes", file_size);

        let upload_id = self
            .client
            .create_upload_session(&access_token, file_size)
            .await?;

        let mut manager = UploadChunkManager::new(file_size, self.chunk_size)?;
        let media_id = self
            .upload_chunks(&access_token, &upload_id, file_path, &mut manager)
            .await;

        let mut report = UploadReport {
            file_size,
            total_chunks: manager.chunk_count(),
            failed_chunks: manager.failed_indices(),
            media_id,
            space_path,
            attached: false,
        };

        if !report.failed_chunks.is_empty() {
            error!(
                "{} 个分片上传失败: {:?}",
                report.failed_chunks.len(),
                report.failed_chunks
            );
            if self.require_complete {
                warn!("存在失败分片，不添加到钉盘");
                return Ok(report);
            }
        }

        let Some(media_id) = report.media_id.clone() else {
            warn!("没有得到 media id，不添加到钉盘");
            return Ok(report);
        };

        let cookie = self
            .cookie_store
            .ensure_cookie(self.cookie_provider.as_ref())
            .await?;

        let attached = self
            .client
            .add_file_to_space(
                &access_token,
                &cookie,
                &media_id,
                &self.client.config().space_id,
                &report.space_path,
            )
            .await?;
        report.attached = attached;

        Ok(report)
    }

    /// 顺序上传所有分片
    ///
    /// 分片失败不会中断后续分片，结果记录在 `manager` 中。
    ///
    /// # 返回
    /// 最后一个分片成功时返回的 media id
    async fn upload_chunks(
        &self,
        access_token: &str,
        upload_id: &str,
        file_path: &Path,
        manager: &mut UploadChunkManager,
    ) -> Option<String> {
        let total = manager.chunk_count();
        let mut media_id = None;

        for chunk in manager.chunks().to_vec() {
            let seq = chunk.index + 1;
            info!("上传分片 {}/{}", seq, total);

            let result = match chunk.read_data(file_path).await {
                Ok(data) => {
                    self.client
                        .upload_chunk(access_token, upload_id, &chunk, data)
                        .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(filepath) => {
                    manager.mark_completed(chunk.index);
                    info!(
                        "分片 {}/{} 上传成功, 进度 {:.1}%",
                        seq,
                        total,
                        manager.progress()
                    );
                    if manager.is_last(chunk.index) && !filepath.is_empty() {
                        media_id = Some(filepath);
                    }
                }
                Err(e) => {
                    manager.mark_failed(chunk.index);
                    error!("分片 {}/{} 上传失败: {:#}", seq, total, e);
                }
            }
        }

        media_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DingTalkConfig;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockOptions {
        /// 需要返回失败的 NDPartition
        fail_partition: Option<&'static str>,
        reject_token: bool,
        reject_create: bool,
    }

    struct MockState {
        options: MockOptions,
        partitions: Mutex<Vec<String>>,
        space_bodies: Mutex<Vec<Value>>,
    }

    async fn gettoken(State(state): State<Arc<MockState>>) -> Json<Value> {
        if state.options.reject_token {
            Json(json!({"errcode": 40089, "errmsg": "不合法的corpid或corpsecret"}))
        } else {
            Json(json!({"errcode": 0, "errmsg": "ok", "access_token": "TOKEN"}))
        }
    }

    async fn upload_create(State(state): State<Arc<MockState>>) -> Json<Value> {
        if state.options.reject_create {
            Json(json!({"code": "40035", "msg": "缺少参数 size"}))
        } else {
            Json(json!({"code": "0", "uploadid": "UP"}))
        }
    }

    async fn upload(
        State(state): State<Arc<MockState>>,
        headers: HeaderMap,
        _body: Bytes,
    ) -> Json<Value> {
        let partition = headers
            .get("NDPartition")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        state.partitions.lock().unwrap().push(partition.clone());

        if state.options.fail_partition == Some(partition.as_str()) {
            Json(json!({"code": "500", "msg": "chunk rejected"}))
        } else {
            Json(json!({"code": "0", "filepath": format!("@{}", partition)}))
        }
    }

    async fn space_add(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
        state.space_bodies.lock().unwrap().push(body);
        Json(json!({"success": true}))
    }

    async fn start_server(options: MockOptions) -> (String, Arc<MockState>) {
        let state = Arc::new(MockState {
            options,
            partitions: Mutex::new(Vec::new()),
            space_bodies: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/gettoken", get(gettoken))
            .route("/file/upload/create", get(upload_create))
            .route("/file/upload", post(upload))
            .route("/v1/space/file/add", post(space_add))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    struct StaticProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CookieProvider for StaticProvider {
        async fn acquire(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("sid=test".to_string())
        }
    }

    fn build_engine(
        base: &str,
        cookie_dir: &Path,
        chunk_size: u64,
    ) -> (UploadEngine, Arc<StaticProvider>) {
        let config = DingTalkConfig {
            corp_id: "corp".to_string(),
            corp_secret: "secret".to_string(),
            space_id: "SPACE".to_string(),
            space_path: "/backup".to_string(),
            oapi_base: base.to_string(),
            space_api_base: base.to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        let client = DingTalkClient::new(config, Duration::from_millis(1)).unwrap();
        let store = CookieStore::new(cookie_dir.join("cookie.json"), 561_600);
        let provider = Arc::new(StaticProvider {
            calls: AtomicUsize::new(0),
        });
        let engine = UploadEngine::new(client, store, provider.clone(), chunk_size);
        (engine, provider)
    }

    #[tokio::test]
    async fn test_upload_file_success() {
        let (base, state) = start_server(MockOptions::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.txt");
        tokio::fs::write(&file, b"0123456789").await.unwrap();

        let (engine, provider) = build_engine(&base, dir.path(), 4);
        let report = engine.upload_file(&file).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.file_size, 10);
        assert_eq!(report.total_chunks, 3);
        assert!(report.failed_chunks.is_empty());
        assert_eq!(report.media_id.as_deref(), Some("@bytes=8-9"));
        assert_eq!(report.space_path, "/backup/report.txt");

        assert_eq!(
            *state.partitions.lock().unwrap(),
            vec!["bytes=0-3", "bytes=4-7", "bytes=8-9"]
        );

        let bodies = state.space_bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["tempUrl"], "@bytes=8-9");
        assert_eq!(bodies[0]["path"], "/backup/report.txt");
        assert_eq!(bodies[0]["spaceId"], "SPACE");

        // Cookie 已缓存
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("cookie.json").exists());
    }

    fn fail_partition(partition: &'static str) -> MockOptions {
        MockOptions {
            fail_partition: Some(partition),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_middle_chunk_failure_still_attaches() {
        let (base, state) = start_server(fail_partition("bytes=4-7")).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        tokio::fs::write(&file, b"0123456789").await.unwrap();

        let (engine, provider) = build_engine(&base, dir.path(), 4);
        let report = engine.upload_file(&file).await.unwrap();

        // 失败后仍继续上传后续分片，失败分片记录在结果中
        assert_eq!(state.partitions.lock().unwrap().len(), 3);
        assert_eq!(report.failed_chunks, vec![1]);
        assert_eq!(report.media_id.as_deref(), Some("@bytes=8-9"));

        // 最后一个分片给出了 media id，照常添加到钉盘
        assert!(report.attached);
        let bodies = state.space_bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["tempUrl"], "@bytes=8-9");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_require_complete_skips_attach_on_failure() {
        let (base, state) = start_server(fail_partition("bytes=4-7")).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        tokio::fs::write(&file, b"0123456789").await.unwrap();

        let (engine, provider) = build_engine(&base, dir.path(), 4);
        let engine = engine.require_complete(true);
        let report = engine.upload_file(&file).await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failed_chunks, vec![1]);
        assert_eq!(state.partitions.lock().unwrap().len(), 3);
        assert_eq!(report.media_id.as_deref(), Some("@bytes=8-9"));

        assert!(state.space_bodies.lock().unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_token_rejection_aborts_before_upload() {
        let (base, state) = start_server(MockOptions {
            reject_token: true,
            ..Default::default()
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        tokio::fs::write(&file, b"0123456789").await.unwrap();

        let (engine, provider) = build_engine(&base, dir.path(), 4);
        let err = engine.upload_file(&file).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<crate::dingtalk::ApiError>(),
            Some(crate::dingtalk::ApiError::Token { .. })
        ));
        assert!(state.partitions.lock().unwrap().is_empty());
        assert!(state.space_bodies.lock().unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_session_rejection_aborts_before_upload() {
        let (base, state) = start_server(MockOptions {
            reject_create: true,
            ..Default::default()
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        tokio::fs::write(&file, b"0123456789").await.unwrap();

        let (engine, provider) = build_engine(&base, dir.path(), 4);
        let err = engine.upload_file(&file).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<crate::dingtalk::ApiError>(),
            Some(crate::dingtalk::ApiError::UploadSession { .. })
        ));
        assert!(state.partitions.lock().unwrap().is_empty());
        assert!(state.space_bodies.lock().unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("cookie.json").exists());
    }

    #[tokio::test]
    async fn test_failed_last_chunk_has_no_media_id() {
        let (base, _state) = start_server(fail_partition("bytes=8-9")).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        tokio::fs::write(&file, b"0123456789").await.unwrap();

        let (engine, _) = build_engine(&base, dir.path(), 4);
        let report = engine.upload_file(&file).await.unwrap();

        assert_eq!(report.failed_chunks, vec![2]);
        assert_eq!(report.media_id, None);
        assert!(!report.attached);
    }

    #[tokio::test]
    async fn test_empty_file_is_not_attached() {
        let (base, state) = start_server(MockOptions::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.txt");
        tokio::fs::write(&file, b"").await.unwrap();

        let (engine, _) = build_engine(&base, dir.path(), 4);
        let report = engine.upload_file(&file).await.unwrap();

        assert_eq!(report.total_chunks, 0);
        assert_eq!(report.media_id, None);
        assert!(!report.is_success());
        assert!(state.partitions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let (base, _) = start_server(MockOptions::default()).await;
        let dir = tempfile::tempdir().unwrap();

        let (engine, _) = build_engine(&base, dir.path(), 4);
        assert!(engine
            .upload_file(&dir.path().join("nope.txt"))
            .await
            .is_err());
    }
}
