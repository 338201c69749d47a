use common::http::{build_client, request_text};
use common::{
    BOT_UA, CacheManager, FetchResult, ResiliencePolicy, ResilientFetch, cache_key, decode_payload,
};

use crate::models::VixBlueskyResponse;

pub const VIXBLUESKY_URL: &str = "https://bskyx.app";

/// VixBluesky 客户端
pub struct VixBlueskyClient {
    client: reqwest::Client,
    fetch: ResilientFetch,
    base_url: String,
}

impl VixBlueskyClient {
    pub fn new(cache: CacheManager) -> anyhow::Result<Self> {
        Self::with_options(cache, ResiliencePolicy::default(), VIXBLUESKY_URL)
    }

    pub fn with_options(
        cache: CacheManager,
        policy: ResiliencePolicy,
        base_url: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(BOT_UA)?,
            fetch: ResilientFetch::new(cache, policy),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 获取帖子，`Ok(None)` 表示帖子不存在或响应无法解析
    pub async fn get_post(
        &self,
        name: &str,
        identifier: &str,
    ) -> FetchResult<Option<VixBlueskyResponse>> {
        let url = format!("{}/profile/{}/post/{}/json", self.base_url, name, identifier);
        let key = cache_key("vixbluesky.post", &[name, identifier]);

        let raw = self
            .fetch
            .execute(&key, || {
                let request = self
                    .client
                    .get(&url)
                    .header(reqwest::header::ACCEPT, "application/json");
                request_text(request, &url)
            })
            .await?;

        log::trace!("VixBluesky response: {:?}", raw);

        Ok(decode_payload("VixBluesky", raw))
    }
}
