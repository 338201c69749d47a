use common::{
    Color, ProcessResponse, ProcessorError, ProcessorResultType, SiteAdapter, SiteMatch,
    SourceMessage, build_site_regex,
};
use regex::Regex;
use std::sync::OnceLock;

static X_REGEX: OnceLock<Regex> = OnceLock::new();

const FXTWITTER_URL: &str = "https://fxtwitter.com";

/// X/Twitter 适配器
///
/// 不请求网络，直接把链接改写为 fxtwitter，由平台生成预览。
pub struct XAdapter;

impl XAdapter {
    const PATTERN: &'static str = r"https?://(?:www\.|mobile\.)?(?:x\.com|(?:vx)?twitter\.com)/(?<user>\w+)/status/(?<id>\d+)";
}

#[async_trait::async_trait]
impl SiteAdapter for XAdapter {
    fn identifier(&self) -> &'static str {
        "Twitter"
    }

    fn pattern(&self) -> &str {
        Self::PATTERN
    }

    fn regex(&self) -> &Regex {
        X_REGEX.get_or_init(|| build_site_regex(Self::PATTERN).expect("Invalid X regex pattern"))
    }

    fn color(&self) -> Color {
        Color(0x1DA1F2)
    }

    async fn process(
        &self,
        matched: &SiteMatch,
        _source: Option<&dyn SourceMessage>,
    ) -> ProcessorResultType {
        let (Some(username), Some(status_id)) = (matched.name("user"), matched.name("id")) else {
            return Err(ProcessorError::new("无法解析X链接"));
        };

        log::debug!(
            "X link details - Username: {}, Status ID: {}",
            username,
            status_id
        );

        Ok(Some(ProcessResponse::text(format!(
            "{}/{}/status/{}",
            FXTWITTER_URL, username, status_id
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::find_matches;

    #[tokio::test]
    async fn test_rewrites_to_fxtwitter() {
        let adapter = XAdapter;
        let matches = find_matches(
            &adapter,
            "look https://x.com/someone/status/123456789 and https://twitter.com/other/status/42",
        );
        assert_eq!(matches.len(), 2);

        let response = adapter.process(&matches[0], None).await.unwrap().unwrap();
        assert_eq!(
            response.text.as_deref(),
            Some("https://fxtwitter.com/someone/status/123456789")
        );
        assert!(response.embeds.is_empty());
    }

    #[test]
    fn test_pattern_is_case_insensitive() {
        let adapter = XAdapter;
        let matches = find_matches(&adapter, "HTTPS://X.COM/Someone/status/1");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name("user"), Some("Someone"));
    }
}
