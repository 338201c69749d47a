use common::http::{REQUEST_TIMEOUT, download, get_text, probe_content_length};
use common::{
    CacheManager, FetchResult, GENERAL_UA, ResiliencePolicy, ResilientFetch, cache_key,
    decode_payload, get_env_var,
};
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue, REFERER};

use crate::models::{IllustrationDetails, IllustrationPage, PixivApiResponse};
use crate::session::{PixivSession, SessionState};
use crate::utils::is_logged_in_page;

pub const PIXIV_BASE_URL: &str = "https://www.pixiv.net";

/// Pixiv 上游接口
#[async_trait::async_trait]
pub trait PixivApi: Send + Sync {
    /// 确认会话有效
    async fn login(&self) -> bool;

    async fn illustration_details(&self, id: &str) -> FetchResult<Option<IllustrationDetails>>;

    async fn illustration_pages(&self, id: &str) -> FetchResult<Option<Vec<IllustrationPage>>>;

    /// HEAD 探测文件大小
    async fn poke_file(&self, url: &str) -> Option<u64>;

    async fn get_file(&self, url: &str) -> FetchResult<Option<Vec<u8>>>;
}

/// 使用 PHPSESSID Cookie 的 Ajax API 客户端
pub struct PixivClient {
    client: reqwest::Client,
    fetch: ResilientFetch,
    session: PixivSession,
    base_url: String,
    has_cookie: bool,
}

impl PixivClient {
    /// 从 `PIXIV_SESSION_COOKIE` 读取 Cookie
    pub fn new(cache: CacheManager) -> anyhow::Result<Self> {
        let cookie = get_env_var("PIXIV_SESSION_COOKIE").filter(|c| !c.trim().is_empty());
        Self::with_options(cache, ResiliencePolicy::default(), PIXIV_BASE_URL, cookie.as_deref())
    }

    pub fn with_options(
        cache: CacheManager,
        policy: ResiliencePolicy,
        base_url: &str,
        session_cookie: Option<&str>,
    ) -> anyhow::Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_str(&format!("{}/", base_url))?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(cookie) = session_cookie {
            let mut value = HeaderValue::from_str(&format!("PHPSESSID={}", cookie.trim()))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        } else {
            log::warn!("PIXIV_SESSION_COOKIE is not set, Pixiv links will not be processed");
        }

        let client = reqwest::Client::builder()
            .user_agent(GENERAL_UA)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            fetch: ResilientFetch::new(cache, policy),
            session: PixivSession::new(),
            base_url,
            has_cookie: session_cookie.is_some(),
        })
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    async fn cookie_login(&self) -> bool {
        match get_text(&self.client, &self.base_url).await {
            Ok(html) => is_logged_in_page(&html),
            Err(e) => {
                log::debug!("Failed logging into Pixiv with error: {}", e);
                false
            }
        }
    }

    /// 凭据被拒绝时让会话失效
    fn observe<T>(&self, result: FetchResult<T>) -> FetchResult<T> {
        if let Err(e) = &result {
            if e.is_unauthorized() {
                self.session.invalidate();
            }
        }
        result
    }

    async fn ajax<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        path: &str,
    ) -> FetchResult<Option<T>> {
        let url = format!("{}/ajax/{}", self.base_url, path);
        let raw = self
            .observe(
                self.fetch
                    .execute(key, || get_text(&self.client, &url))
                    .await,
            )?;

        Ok(decode_payload::<PixivApiResponse<T>>("Pixiv", raw).and_then(PixivApiResponse::into_body))
    }
}

#[async_trait::async_trait]
impl PixivApi for PixivClient {
    async fn login(&self) -> bool {
        if !self.has_cookie {
            return false;
        }
        self.session.ensure(|| self.cookie_login()).await
    }

    async fn illustration_details(&self, id: &str) -> FetchResult<Option<IllustrationDetails>> {
        let key = cache_key("pixiv.illustration_details", &[id]);
        self.ajax(&key, &format!("illust/{}", id)).await
    }

    async fn illustration_pages(&self, id: &str) -> FetchResult<Option<Vec<IllustrationPage>>> {
        let key = cache_key("pixiv.illustration_pages", &[id]);
        self.ajax(&key, &format!("illust/{}/pages", id)).await
    }

    async fn poke_file(&self, url: &str) -> Option<u64> {
        match self
            .fetch
            .execute_uncached(|| probe_content_length(&self.client, url))
            .await
        {
            Ok(size) => size.flatten(),
            Err(e) => {
                log::debug!("Failed to probe {}: {}", url, e);
                None
            }
        }
    }

    async fn get_file(&self, url: &str) -> FetchResult<Option<Vec<u8>>> {
        log::debug!("Attempting to download {}...", url);
        self.observe(
            self.fetch
                .execute_uncached(|| download(&self.client, url))
                .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, cookie: Option<&str>) -> PixivClient {
        let policy = ResiliencePolicy::default()
            .base_delay(Duration::from_millis(1))
            .jitter(false);
        PixivClient::with_options(
            CacheManager::in_memory(Duration::from_secs(60)),
            policy,
            &server.uri(),
            cookie,
        )
        .unwrap()
    }

    async fn mount_home(server: &MockServer, times: u64) {
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("cookie", "PHPSESSID=abc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<a href=\"/logout.php\">Logout</a>"),
            )
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_details_are_decoded_and_cached() {
        let server = MockServer::start().await;
        mount_home(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/ajax/illust/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"error":false,"message":"","body":{"id":"42","title":"t","description":"","illustType":0,
                    "urls":{"mini":null,"thumb":null,"small":"s","regular":"r","original":"o"},"pageCount":3}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, Some("abc"));
        assert!(client.login().await);
        assert!(client.login().await);

        for _ in 0..2 {
            let details = client.illustration_details("42").await.unwrap().unwrap();
            assert_eq!(details.page_count, 3);
            assert_eq!(details.urls.candidates(), vec!["o", "r", "s"]);
        }

        server.verify().await;
    }

    #[tokio::test]
    async fn test_forbidden_invalidates_session() {
        let server = MockServer::start().await;
        mount_home(&server, 2).await;
        Mock::given(method("GET"))
            .and(path("/ajax/illust/7"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client(&server, Some("abc"));
        assert!(client.login().await);
        assert_eq!(client.session_state(), SessionState::Active);

        let error = client.illustration_details("7").await.unwrap_err();
        assert!(error.is_unauthorized());
        assert_eq!(client.session_state(), SessionState::Unknown);

        // 重新检查登录状态
        assert!(client.login().await);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_api_error_flag_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ajax/illust/9"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"error":true,"message":"該当作品は削除されたか、存在しない作品IDです。","body":[]}"#,
            ))
            .mount(&server)
            .await;

        let client = client(&server, Some("abc"));
        assert!(client.illustration_details("9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_cookie_never_logs_in() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("logout.php"))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server, None);
        assert!(!client.login().await);
        server.verify().await;
    }
}
