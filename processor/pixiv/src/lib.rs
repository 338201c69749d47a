//! Pixiv 链接处理模块
//!
//! 使用 PHPSESSID Cookie 访问 Ajax API：
//!
//! - 单图按清晰度从高到低探测，取第一张低于上传上限的图片直接上传
//! - 多图按频道配置的数量截断，超出时附带图集说明
//! - 动图改写为 phixiv 链接

use std::sync::{Arc, OnceLock};

use common::{
    CacheManager, Color, ProcessorError, ProcessorResultType, SiteAdapter, SiteMatch,
    SourceMessage, build_site_regex,
};
use regex::Regex;

mod api;
mod models;
mod processor;
mod session;
mod utils;


pub use api::{PIXIV_BASE_URL, PixivApi, PixivClient};
pub use models::{
    IllustrationDetails, IllustrationPage, IllustrationPageUrls, IllustrationUrls,
    ILLUST_TYPE_UGOIRA,
};
pub use processor::process_illustration;
pub use session::{PixivSession, SessionState};

static PIXIV_REGEX: OnceLock<Regex> = OnceLock::new();

/// Pixiv 适配器
pub struct PixivAdapter {
    api: Arc<dyn PixivApi>,
    post_limit: u32,
}

impl PixivAdapter {
    const PATTERN: &'static str = r"https?://(?:www\.)?pixiv\.net/(?:\S*/)?artworks/(?<id>\d+)/?";

    /// `post_limit` 是没有来源消息时的全局图片上限
    pub fn new(cache: CacheManager, post_limit: u32) -> anyhow::Result<Self> {
        Ok(Self::with_api(Arc::new(PixivClient::new(cache)?), post_limit))
    }

    pub fn with_api(api: Arc<dyn PixivApi>, post_limit: u32) -> Self {
        Self { api, post_limit }
    }
}

#[async_trait::async_trait]
impl SiteAdapter for PixivAdapter {
    fn identifier(&self) -> &'static str {
        "Pixiv"
    }

    fn pattern(&self) -> &str {
        Self::PATTERN
    }

    fn regex(&self) -> &Regex {
        PIXIV_REGEX
            .get_or_init(|| build_site_regex(Self::PATTERN).expect("Invalid Pixiv regex pattern"))
    }

    fn color(&self) -> Color {
        Color(0x0096FA)
    }

    async fn process(
        &self,
        matched: &SiteMatch,
        source: Option<&dyn SourceMessage>,
    ) -> ProcessorResultType {
        let Some(id) = matched.name("id") else {
            return Err(ProcessorError::new("无法从Pixiv链接中提取作品ID"));
        };

        let post_limit = source
            .map(|s| s.settings().maximum_pixiv_images)
            .unwrap_or(self.post_limit);

        process_illustration(self.api.as_ref(), id, post_limit as usize).await
    }
}
