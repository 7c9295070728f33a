// 上传模块
//
// 钉钉分片上传：顺序上传，不做并发

pub mod chunk;
pub mod engine;

pub use chunk::{ChunkStatus, UploadChunk, UploadChunkManager, DEFAULT_UPLOAD_CHUNK_SIZE};
pub use engine::{UploadEngine, UploadReport};
