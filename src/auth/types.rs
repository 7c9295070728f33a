// 认证模块数据类型定义

use serde::{Deserialize, Serialize};

/// Cookie 缓存记录
///
/// 文件格式: `{"expiration": 1700000000, "cookie": "..."}`。
/// `expiration` 实际记录的是获取 Cookie 的时间戳（秒）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    /// 获取时间戳（秒）
    pub expiration: i64,
    /// 完整 Cookie 字符串
    pub cookie: String,
}

impl CookieRecord {
    pub fn new(cookie: String, acquired_at: i64) -> Self {
        Self {
            expiration: acquired_at,
            cookie,
        }
    }

    /// 已使用时长（秒）
    pub fn age(&self, now: i64) -> i64 {
        now - self.expiration
    }

    /// 是否超过最长使用时间
    pub fn is_stale(&self, now: i64, max_age_secs: i64) -> bool {
        self.age(now) > max_age_secs
    }
}

/// Cookie 缓存状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieState {
    /// 缓存文件不存在或无法解析
    Missing,
    /// 缓存有效
    Fresh(CookieRecord),
    /// 缓存已过期，需要续期
    Stale(CookieRecord),
}

impl CookieState {
    /// 根据记录和当前时间判定状态
    pub fn classify(record: CookieRecord, now: i64, max_age_secs: i64) -> Self {
        if record.is_stale(now, max_age_secs) {
            CookieState::Stale(record)
        } else {
            CookieState::Fresh(record)
        }
    }

    pub fn needs_renewal(&self) -> bool {
        !matches!(self, CookieState::Fresh(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_AGE: i64 = 561_600;

    #[test]
    fn test_stale_boundary() {
        let record = CookieRecord::new("a=b".to_string(), 1_000);

        // 恰好等于阈值时仍然有效
        assert!(!record.is_stale(1_000 + MAX_AGE, MAX_AGE));
        assert!(record.is_stale(1_000 + MAX_AGE + 1, MAX_AGE));
    }

    #[test]
    fn test_classify() {
        let record = CookieRecord::new("a=b".to_string(), 0);
        assert_eq!(
            CookieState::classify(record.clone(), 10, MAX_AGE),
            CookieState::Fresh(record.clone())
        );
        let state = CookieState::classify(record.clone(), MAX_AGE + 10, MAX_AGE);
        assert_eq!(state, CookieState::Stale(record));
        assert!(state.needs_renewal());
        assert!(CookieState::Missing.needs_renewal());
    }

    #[test]
    fn test_record_json_layout() {
        let record = CookieRecord::new("sid=xyz".to_string(), 1_545_900_000);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["expiration"], 1_545_900_000);
        assert_eq!(json["cookie"], "sid=xyz");

        let parsed: CookieRecord =
            serde_json::from_str(r#"{"expiration": 42, "cookie": "k=v"}"#).unwrap();
        assert_eq!(parsed, CookieRecord::new("k=v".to_string(), 42));
    }
}
