use std::future::Future;
use std::sync::{Mutex, PoisonError};

/// Cookie 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 尚未检查，或凭据被拒绝后需要重新检查
    Unknown,
    Active,
    /// 上次检查失败，下次调用仍会重新检查
    Rejected,
}

/// PHPSESSID 会话
///
/// 只有 `Active` 会被记住；API 返回 401/403 时退回 `Unknown`，
/// 下一次请求前重新确认登录状态。
#[derive(Debug)]
pub struct PixivSession {
    state: Mutex<SessionState>,
}

impl Default for PixivSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PixivSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Unknown),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// 已激活直接返回，否则执行 `check` 并记录结果
    pub async fn ensure<F, Fut>(&self, check: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        if self.state() == SessionState::Active {
            return true;
        }

        let logged_in = check().await;
        self.set(if logged_in {
            SessionState::Active
        } else {
            SessionState::Rejected
        });

        if logged_in {
            log::info!("Pixiv session is active");
        }
        logged_in
    }

    pub fn invalidate(&self) {
        if self.state() == SessionState::Active {
            log::warn!("Pixiv rejected the session cookie, it will be re-checked");
        }
        self.set(SessionState::Unknown);
    }
}
