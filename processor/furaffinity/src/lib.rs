//! FurAffinity 链接处理模块，数据来自 bawk.space

use std::sync::OnceLock;

use common::http::{build_client, get_text};
use common::{
    BOT_UA, CacheManager, Color, Embed, EmbedAuthor, FetchResult, ProcessResponse,
    ProcessorError, ProcessorResultType, ResiliencePolicy, ResilientFetch, SiteAdapter, SiteMatch,
    SourceMessage, build_site_regex, cache_key, decode_payload,
};
use regex::Regex;
use serde::Deserialize;

pub const BAWK_URL: &str = "https://bawk.space";

static FURAFFINITY_REGEX: OnceLock<Regex> = OnceLock::new();

/// bawk.space 投稿信息
#[derive(Debug, Deserialize)]
pub struct BawkSubmission {
    pub author: String,
    pub avatar: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub title: String,
}

pub struct BawkClient {
    client: reqwest::Client,
    fetch: ResilientFetch,
    base_url: String,
}

impl BawkClient {
    pub fn new(cache: CacheManager) -> anyhow::Result<Self> {
        Self::with_options(cache, ResiliencePolicy::default(), BAWK_URL)
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

    pub async fn get_submission(&self, id: &str) -> FetchResult<Option<BawkSubmission>> {
        let url = format!("{}/fapi/submission/{}", self.base_url, id);
        let key = cache_key("furaffinity.submission", &[id]);

        let raw = self
            .fetch
            .execute(&key, || get_text(&self.client, &url))
            .await?;

        Ok(decode_payload("FurAffinity", raw))
    }
}

/// FurAffinity 适配器
pub struct FurAffinityAdapter {
    client: BawkClient,
}

impl FurAffinityAdapter {
    const PATTERN: &'static str = r"https?://(?:www\.)?furaffinity\.net/(?:view|full)/(?<id>\d+)";

    pub fn new(cache: CacheManager) -> anyhow::Result<Self> {
        Ok(Self::with_client(BawkClient::new(cache)?))
    }

    pub fn with_client(client: BawkClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SiteAdapter for FurAffinityAdapter {
    fn identifier(&self) -> &'static str {
        "FurAffinity"
    }

    fn pattern(&self) -> &str {
        Self::PATTERN
    }

    fn regex(&self) -> &Regex {
        FURAFFINITY_REGEX.get_or_init(|| {
            build_site_regex(Self::PATTERN).expect("Invalid FurAffinity regex pattern")
        })
    }

    fn color(&self) -> Color {
        Color(0xFAAF3A)
    }

    async fn process(
        &self,
        matched: &SiteMatch,
        _source: Option<&dyn SourceMessage>,
    ) -> ProcessorResultType {
        let Some(id) = matched.name("id") else {
            return Err(ProcessorError::new("无法从FurAffinity链接中提取投稿ID"));
        };

        let Some(submission) = self.client.get_submission(id).await? else {
            return Ok(None);
        };

        log::debug!("FurAffinity {} rated {}", id, submission.rating);

        let embed = Embed::new(self.color())
            .title(submission.title)
            .url(matched.as_str())
            .image(submission.image_url)
            .author(EmbedAuthor {
                name: submission.author,
                icon_url: submission.avatar,
                url: None,
            });

        Ok(Some(ProcessResponse {
            embeds: vec![embed],
            ..Default::default()
        }))
    }
}
