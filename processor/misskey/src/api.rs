use common::http::{build_client, request_text};
use common::{
    BOT_UA, CacheManager, FetchResult, ResiliencePolicy, ResilientFetch, cache_key, decode_payload,
};

use crate::models::MisskeyNote;

/// Misskey 实例客户端，实例地址随链接传入
pub struct MisskeyClient {
    client: reqwest::Client,
    fetch: ResilientFetch,
}

impl MisskeyClient {
    pub fn new(cache: CacheManager) -> anyhow::Result<Self> {
        Self::with_policy(cache, ResiliencePolicy::default())
    }

    pub fn with_policy(cache: CacheManager, policy: ResiliencePolicy) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(BOT_UA)?,
            fetch: ResilientFetch::new(cache, policy),
        })
    }

    pub async fn show_note(&self, instance: &str, id: &str) -> FetchResult<Option<MisskeyNote>> {
        let instance = instance.trim_end_matches('/');
        let url = format!("{}/api/notes/show", instance);
        let key = cache_key("misskey.note", &[instance, id]);
        let body = serde_json::json!({ "noteId": id });

        let raw = self
            .fetch
            .execute(&key, || request_text(self.client.post(&url).json(&body), &url))
            .await?;

        log::trace!("Misskey response: {:?}", raw);

        Ok(decode_payload("Misskey", raw))
    }
}
