// 钉盘 Web 接口请求头
//
// 添加文件到钉盘走的是网页版接口，需要模拟浏览器请求

pub const SPACE_ACCEPT: &str = "*/*";

pub const SPACE_ACCEPT_ENCODING: &str = "gzip, deflate, br";

pub const SPACE_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9";

pub const SPACE_REFERER_QUERY: &str =
    "?spm=a3140.8736650.2231772.1.7eb3e3dwxRnir&source=2202&lwfrom=2017120202092064209309201";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/63.0.3239.108 Safari/537.36";

/// 分片上传时 multipart 中的文件名
pub const CHUNK_FILE_NAME: &str = "blob";

/// 分片字节范围请求头
pub const ND_PARTITION_HEADER: &str = "NDPartition";
