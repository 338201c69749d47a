//! 外部请求错误分类

use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// 上游明确表示资源不存在
    #[error("resource not found: {url}")]
    NotFound { url: String },

    /// 上游 5xx
    #[error("upstream server error {status}: {url}")]
    Server { status: u16, url: String },

    /// 上游限流（429）
    #[error("upstream rate limited: {url}")]
    RateLimited { url: String },

    /// 其他非成功状态码
    #[error("unexpected HTTP status {status}: {url}")]
    Status { status: u16, url: String },

    /// 单次尝试超时
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// 传输层错误
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// 响应无法解析
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// 缓存读写失败
    #[error("cache error: {0}")]
    Cache(String),
}

impl FetchError {
    /// 根据状态码分类，成功状态返回 `None`
    pub fn from_status(status: StatusCode, url: &str) -> Option<Self> {
        if status.is_success() {
            return None;
        }

        let url = url.to_string();
        Some(match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => Self::NotFound { url },
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { url },
            s if s.is_server_error() => Self::Server {
                status: s.as_u16(),
                url,
            },
            s => Self::Status {
                status: s.as_u16(),
                url,
            },
        })
    }

    /// 可重试的暂时性错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Server { .. } | Self::RateLimited { .. } | Self::Timeout(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// 凭据被拒绝（401/403）
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
