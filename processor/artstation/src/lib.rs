//! ArtStation 链接处理模块

use std::sync::OnceLock;

use common::settings::env_parse;
use common::{
    CacheManager, Color, ProcessorError, ProcessorResultType, SiteAdapter, SiteMatch,
    SourceMessage, build_site_regex,
};
use regex::Regex;

mod api;
mod models;
mod processor;

pub use api::{ARTSTATION_URL, ArtStationClient};
pub use models::{ArtStationAsset, ArtStationProject, ArtStationUser};
pub use processor::build_response;

pub const DEFAULT_POST_LIMIT: usize = 5;

static ARTSTATION_REGEX: OnceLock<Regex> = OnceLock::new();

/// ArtStation 适配器
pub struct ArtStationAdapter {
    client: ArtStationClient,
    post_limit: usize,
}

impl ArtStationAdapter {
    const PATTERN: &'static str =
        r"https?://(?:www\.)?artstation\.com/artwork/(?<hash>[^/\s?#]+)";

    /// 上限读取自 `ARTSTATION_POST_LIMIT`
    pub fn new(cache: CacheManager) -> anyhow::Result<Self> {
        let post_limit = env_parse("ARTSTATION_POST_LIMIT").unwrap_or(DEFAULT_POST_LIMIT);
        Ok(Self::with_client(ArtStationClient::new(cache)?, post_limit))
    }

    pub fn with_client(client: ArtStationClient, post_limit: usize) -> Self {
        Self { client, post_limit }
    }
}

#[async_trait::async_trait]
impl SiteAdapter for ArtStationAdapter {
    fn identifier(&self) -> &'static str {
        "ArtStation"
    }

    fn pattern(&self) -> &str {
        Self::PATTERN
    }

    fn regex(&self) -> &Regex {
        ARTSTATION_REGEX.get_or_init(|| {
            build_site_regex(Self::PATTERN).expect("Invalid ArtStation regex pattern")
        })
    }

    fn color(&self) -> Color {
        Color(0x13AFF0)
    }

    async fn process(
        &self,
        matched: &SiteMatch,
        _source: Option<&dyn SourceMessage>,
    ) -> ProcessorResultType {
        let Some(hash) = matched.name("hash") else {
            return Err(ProcessorError::new("无法从ArtStation链接中提取作品ID"));
        };

        let Some(project) = self.client.get_project(hash).await? else {
            return Ok(None);
        };

        let response = build_response(&project, self.post_limit, self.color());
        if response.is_none() {
            log::debug!("ArtStation project {} has a single asset, skipping", hash);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{FetchError, ResiliencePolicy, find_matches};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn project_json(assets: usize) -> String {
        let assets: Vec<_> = (0..assets)
            .map(|i| {
                let asset_type = if i == 2 { "video" } else { "image" };
                let title = (i == 1).then_some("detail");
                let image_url = format!(
                    "https://cdna.artstation.com/p/assets/images/{}.jpg?1700000000",
                    i
                );
                serde_json::json!({
                    "asset_type": asset_type,
                    "image_url": image_url,
                    "title": title,
                })
            })
            .collect();

        serde_json::json!({
            "title": "Project",
            "permalink": "https://www.artstation.com/artwork/AbC123",
            "published_at": "2023-09-01T08:00:00.000-05:00",
            "views_count": 120,
            "likes_count": 30,
            "cover_url": "https://cdna.artstation.com/p/assets/covers/images/3.jpg?1700000000",
            "user": {
                "full_name": "Artist",
                "permalink": "https://www.artstation.com/artist",
                "medium_avatar_url": "https://cdna.artstation.com/p/users/avatars/1/medium/a.jpg"
            },
            "assets": assets,
        })
        .to_string()
    }

    async fn adapter_with(server: &MockServer, body: String, limit: usize) -> ArtStationAdapter {
        Mock::given(method("GET"))
            .and(path("/projects/AbC123.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;

        let policy = ResiliencePolicy::default()
            .base_delay(Duration::from_millis(1))
            .jitter(false);
        let client = ArtStationClient::with_options(
            CacheManager::in_memory(Duration::from_secs(60)),
            policy,
            &server.uri(),
        )
        .unwrap();
        ArtStationAdapter::with_client(client, limit)
    }

    #[tokio::test]
    async fn test_single_asset_is_absent() {
        let server = MockServer::start().await;
        let adapter = adapter_with(&server, project_json(1), 5).await;
        let matches = find_matches(&adapter, "https://www.artstation.com/artwork/AbC123");
        assert!(adapter.process(&matches[0], None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_skips_first_video_and_cover() {
        let server = MockServer::start().await;
        let adapter = adapter_with(&server, project_json(8), 5).await;
        let matches = find_matches(&adapter, "https://www.artstation.com/artwork/AbC123");
        let response = adapter.process(&matches[0], None).await.unwrap().unwrap();

        // 资源 1..5 中：2 是视频，3 是封面
        assert_eq!(response.embeds.len(), 2);
        assert_eq!(response.embeds[0].title.as_deref(), Some("detail"));
        assert_eq!(response.embeds[1].title.as_deref(), Some("Project"));
        assert!(
            response.embeds[1]
                .image_url
                .as_deref()
                .is_some_and(|u| u.contains("/4.jpg"))
        );
        assert_eq!(response.embeds[0].fields[0].value, "120");
        assert_eq!(response.text.as_deref(), Some("This is part of a 8 image set."));
    }

    #[tokio::test]
    async fn test_within_limit_has_no_note() {
        let server = MockServer::start().await;
        let adapter = adapter_with(&server, project_json(2), 5).await;
        let matches = find_matches(&adapter, "https://artstation.com/artwork/AbC123");
        let response = adapter.process(&matches[0], None).await.unwrap().unwrap();
        assert_eq!(response.embeds.len(), 1);
        assert!(response.text.is_none());
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(4)
            .mount(&server)
            .await;

        let client = ArtStationClient::with_options(
            CacheManager::in_memory(Duration::from_secs(60)),
            ResiliencePolicy::default()
                .base_delay(Duration::from_millis(1))
                .jitter(false),
            &server.uri(),
        )
        .unwrap();
        assert!(client.get_project("AbC123").await.unwrap().is_none());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_unexpected_status_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = ArtStationClient::with_options(
            CacheManager::in_memory(Duration::from_secs(60)),
            ResiliencePolicy::default(),
            &server.uri(),
        )
        .unwrap();
        let error = client.get_project("AbC123").await.unwrap_err();
        assert!(matches!(error, FetchError::Status { status: 400, .. }));
    }
}
