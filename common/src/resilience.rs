//! 弹性请求管线
//!
//! 由外到内：缓存 → 回退 → 重试 → 超时，包裹恰好一个外部调用。
//!
//! - 缓存命中直接返回，不经过后面任何一层。
//! - "资源不存在"以及重试耗尽的暂时性错误都回退为 `None`。
//! - 最终结果（包括 `None`）以同一个 TTL 写回缓存，已确认不存在的资源在 TTL 内
//!   不会被重复请求；代价是 TTL 内新创建的同一资源仍显示为不存在。
//! - 反序列化发生在管线之外（[`decode_payload`]），格式错误的响应不写入缓存，
//!   下次引用会重新请求并重新解析。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::RngExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::CacheManager;
use crate::error::{FetchError, FetchResult};

/// 一次重试的信息
#[derive(Debug)]
pub struct RetryEvent<'a> {
    /// 第几次重试，从 1 开始
    pub attempt: u32,
    pub delay: Duration,
    pub error: &'a FetchError,
}

pub type RetryHook = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// 单个调用点的弹性策略
#[derive(Clone)]
pub struct ResiliencePolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
    pub use_jitter: bool,
    pub should_retry: fn(&FetchError) -> bool,
    pub should_fallback: fn(&FetchError) -> bool,
    on_retry: Option<RetryHook>,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(3),
            timeout: Duration::from_secs(15),
            use_jitter: true,
            should_retry: FetchError::is_transient,
            should_fallback: FetchError::is_not_found,
            on_retry: None,
        }
    }
}

impl std::fmt::Debug for ResiliencePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResiliencePolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("timeout", &self.timeout)
            .field("use_jitter", &self.use_jitter)
            .finish_non_exhaustive()
    }
}

impl ResiliencePolicy {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    pub fn retry_when(mut self, predicate: fn(&FetchError) -> bool) -> Self {
        self.should_retry = predicate;
        self
    }

    pub fn fallback_when(mut self, predicate: fn(&FetchError) -> bool) -> Self {
        self.should_fallback = predicate;
        self
    }

    pub fn on_retry(mut self, hook: impl Fn(&RetryEvent<'_>) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// 指数退避：`base * 2^(attempt - 1)`，启用抖动时乘以 [0.5, 1.5) 的随机系数
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent));

        if self.use_jitter {
            let mut rng = rand::rng();
            let factor: f64 = rng.random_range(0.5..1.5);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }
}

/// 缓存 + 回退 + 重试 + 超时
#[derive(Clone)]
pub struct ResilientFetch {
    cache: CacheManager,
    policy: ResiliencePolicy,
}

impl ResilientFetch {
    pub fn new(cache: CacheManager, policy: ResiliencePolicy) -> Self {
        Self { cache, policy }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    /// 带缓存执行，`Ok(None)` 表示资源不存在
    pub async fn execute<T, F, Fut>(&self, key: &str, operation: F) -> FetchResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        self.cache
            .remember(key, || self.execute_uncached(operation))
            .await
    }

    /// 不经过缓存执行（探测、下载等二进制请求）
    pub async fn execute_uncached<T, F, Fut>(&self, operation: F) -> FetchResult<Option<T>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        match self.run_with_retry(&operation).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if (self.policy.should_fallback)(&e) || (self.policy.should_retry)(&e) => {
                log::debug!("Request fell back to absent: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn run_with_retry<T, F, Fut>(&self, operation: &F) -> FetchResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let mut attempt = 0u32;

        loop {
            let result = match tokio::time::timeout(self.policy.timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(self.policy.timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.policy.max_retries && (self.policy.should_retry)(&e) => {
                    attempt += 1;
                    let delay = self.policy.backoff_delay(attempt);
                    log::warn!(
                        "Transient failure ({}), retry {}/{} in {:?}",
                        e,
                        attempt,
                        self.policy.max_retries,
                        delay
                    );
                    if let Some(hook) = &self.policy.on_retry {
                        hook(&RetryEvent {
                            attempt,
                            delay,
                            error: &e,
                        });
                    }
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 在缓存边界之外解析 JSON 响应，格式错误记为 debug 并视为不存在
pub fn decode_payload<T: DeserializeOwned>(site: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::debug!(
                "Failed to deserialize {} response, response not JSON or is malformed: {}",
                site,
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> ResiliencePolicy {
        ResiliencePolicy::default()
            .base_delay(Duration::from_millis(1))
            .timeout(Duration::from_millis(200))
            .jitter(false)
    }

    fn fetcher(policy: ResiliencePolicy) -> ResilientFetch {
        ResilientFetch::new(CacheManager::in_memory(Duration::from_secs(60)), policy)
    }

    fn server_error() -> FetchError {
        FetchError::Server {
            status: 503,
            url: "https://example.com".into(),
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_operation() {
        let fetch = fetcher(fast_policy());
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let value = fetch
                .execute("site.post_1", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok("payload".to_string()) }
                })
                .await
                .unwrap();
            assert_eq!(value.as_deref(), Some("payload"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let retries = Arc::new(AtomicU32::new(0));
        let observed = retries.clone();
        let fetch = fetcher(fast_policy().on_retry(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
        }));
        let calls = AtomicU32::new(0);

        let value = fetch
            .execute("site.post_2", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(server_error())
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, Some(42));
        assert_eq!(retries.load(Ordering::SeqCst), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_absent_and_cached() {
        let fetch = fetcher(fast_policy());
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let value: Option<String> = fetch
                .execute("site.post_3", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Err(FetchError::NotFound {
                            url: "https://example.com/404".into(),
                        })
                    }
                })
                .await
                .unwrap();
            assert_eq!(value, None);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_against_retry_budget() {
        let fetch = fetcher(fast_policy().timeout(Duration::from_millis(20)));
        let calls = AtomicU32::new(0);

        let value = fetch
            .execute_uncached(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                    Ok("late")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, Some("late"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_collapse_to_absent() {
        let fetch = fetcher(fast_policy().max_retries(2));
        let calls = AtomicU32::new(0);

        let value: Option<String> = fetch
            .execute_uncached(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await
            .unwrap();

        assert_eq!(value, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unclassified_errors_propagate_uncached() {
        let fetch = fetcher(fast_policy());
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let result: FetchResult<Option<String>> = fetch
                .execute("site.post_4", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Err(FetchError::Status {
                            status: 400,
                            url: "https://example.com".into(),
                        })
                    }
                })
                .await;
            assert!(matches!(result, Err(FetchError::Status { status: 400, .. })));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_is_exponential() {
        let policy = ResiliencePolicy::default()
            .base_delay(Duration::from_millis(100))
            .jitter(false);
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));

        let jittered = policy.jitter(true).backoff_delay(3);
        assert!(jittered >= Duration::from_millis(200) && jittered < Duration::from_millis(600));
    }

    #[test]
    fn test_decode_payload_malformed_is_absent() {
        let parsed: Option<Vec<u32>> = decode_payload("test", Some("not json".into()));
        assert!(parsed.is_none());

        let parsed: Option<Vec<u32>> = decode_payload("test", Some("[1,2]".into()));
        assert_eq!(parsed, Some(vec![1, 2]));
    }
}
