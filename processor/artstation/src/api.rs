use common::http::{build_client, request_text};
use common::{
    BOT_UA, CacheManager, FetchResult, ResiliencePolicy, ResilientFetch, cache_key, decode_payload,
};
use reqwest::header::{ACCEPT, REFERER};

use crate::models::ArtStationProject;

pub const ARTSTATION_URL: &str = "https://www.artstation.com";

/// ArtStation 项目接口客户端
pub struct ArtStationClient {
    client: reqwest::Client,
    fetch: ResilientFetch,
    base_url: String,
}

impl ArtStationClient {
    pub fn new(cache: CacheManager) -> anyhow::Result<Self> {
        Self::with_options(cache, ResiliencePolicy::default(), ARTSTATION_URL)
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

    pub async fn get_project(&self, hash: &str) -> FetchResult<Option<ArtStationProject>> {
        let url = format!("{}/projects/{}.json", self.base_url, hash);
        let key = cache_key("artstation.project", &[hash]);

        let raw = self
            .fetch
            .execute(&key, || {
                let request = self
                    .client
                    .get(&url)
                    .header(ACCEPT, "application/json")
                    .header(REFERER, "https://www.artstation.com/");
                request_text(request, &url)
            })
            .await?;

        Ok(decode_payload("ArtStation", raw))
    }
}
