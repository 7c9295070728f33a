// 认证模块
//
// 钉盘 Web 接口依赖浏览器登录后的 Cookie。交互式登录由外部程序完成，
// 这里只负责缓存、过期判断和续期。

pub mod provider;
pub mod store;
pub mod types;

pub use provider::{CommandCookieProvider, CookieProvider, EnvCookieProvider};
pub use store::CookieStore;
pub use types::{CookieRecord, CookieState};
