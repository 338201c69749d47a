//! Bluesky 链接处理模块
//!
//! 通过 VixBluesky 的 JSON 接口获取帖子，视频帖改写为渲染器链接，
//! 图片帖每张图片生成一张卡片。

use common::{
    CacheManager, Color, ProcessorError, ProcessorResultType, SiteAdapter, SiteMatch,
    SourceMessage, build_site_regex,
};
use regex::Regex;
use std::sync::OnceLock;

mod api;
mod models;
mod processor;

pub use api::{VIXBLUESKY_URL, VixBlueskyClient};
pub use models::VixBlueskyResponse;
pub use processor::build_response;

static BLUESKY_REGEX: OnceLock<Regex> = OnceLock::new();

/// Bluesky 适配器
pub struct BlueskyAdapter {
    client: VixBlueskyClient,
}

impl BlueskyAdapter {
    const PATTERN: &'static str =
        r"https?://(?:www\.)?bsky\.app/profile/(?<user>[^/\s]+)/post/(?<id>[^/\s?#]+)/?";

    pub fn new(cache: CacheManager) -> anyhow::Result<Self> {
        Ok(Self::with_client(VixBlueskyClient::new(cache)?))
    }

    pub fn with_client(client: VixBlueskyClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SiteAdapter for BlueskyAdapter {
    fn identifier(&self) -> &'static str {
        "Bluesky"
    }

    fn pattern(&self) -> &str {
        Self::PATTERN
    }

    fn regex(&self) -> &Regex {
        BLUESKY_REGEX
            .get_or_init(|| build_site_regex(Self::PATTERN).expect("Invalid Bluesky regex pattern"))
    }

    fn color(&self) -> Color {
        Color(0x1083FE)
    }

    async fn process(
        &self,
        matched: &SiteMatch,
        _source: Option<&dyn SourceMessage>,
    ) -> ProcessorResultType {
        let (Some(user), Some(id)) = (matched.name("user"), matched.name("id")) else {
            return Err(ProcessorError::new("无法从Bluesky链接中提取帖子信息"));
        };

        let Some(response) = self.client.get_post(user, id).await? else {
            return Ok(None);
        };

        let Some(post) = response.posts.first() else {
            log::debug!("VixBluesky returned no posts for {}/{}", user, id);
            return Ok(None);
        };

        Ok(Some(build_response(user, id, post, self.color())))
    }
}
