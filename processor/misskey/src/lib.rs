//! Misskey 链接处理模块
//!
//! 平台会为单张非敏感图片生成原生预览。带有来源消息时先等待一段时间，
//! 若原生预览已经出现且帖子不需要补充，就不再输出。

use std::sync::OnceLock;
use std::time::Duration;

use common::settings::env_parse;
use common::{
    CacheManager, Color, ProcessorError, ProcessorResultType, SiteAdapter, SiteMatch,
    SourceMessage, build_site_regex,
};
use regex::Regex;

mod api;
mod models;
mod processor;

pub use api::MisskeyClient;
pub use models::{MisskeyFile, MisskeyNote, MisskeyUser};
pub use processor::build_response;

pub const MISSKEY_DOMAINS: [&str; 3] = ["misskey.io", "misskey.design", "oekakiskey.com"];
pub const DEFAULT_EMBED_DELAY: Duration = Duration::from_secs(3);

static MISSKEY_PATTERN: OnceLock<String> = OnceLock::new();
static MISSKEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn misskey_pattern() -> &'static str {
    MISSKEY_PATTERN.get_or_init(|| {
        let domains = MISSKEY_DOMAINS
            .iter()
            .map(|d| regex::escape(d))
            .collect::<Vec<_>>()
            .join("|");
        format!(
            r"(?<url>https?://(?:www\.)?(?:{}))/notes/(?<id>[0-9a-z]+)",
            domains
        )
    })
}

/// 读取 `MISSKEY_EMBED_DELAY`（秒）
pub fn embed_delay_from_env() -> Duration {
    env_parse::<f64>("MISSKEY_EMBED_DELAY")
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_EMBED_DELAY)
}

/// Misskey 适配器
pub struct MisskeyAdapter {
    client: MisskeyClient,
    embed_delay: Duration,
    instance_override: Option<String>,
}

impl MisskeyAdapter {
    pub fn new(cache: CacheManager) -> anyhow::Result<Self> {
        Ok(Self::with_client(
            MisskeyClient::new(cache)?,
            embed_delay_from_env(),
        ))
    }

    pub fn with_client(client: MisskeyClient, embed_delay: Duration) -> Self {
        Self {
            client,
            embed_delay,
            instance_override: None,
        }
    }

    /// 所有请求改发到指定地址
    pub fn with_instance_override(mut self, instance: impl Into<String>) -> Self {
        self.instance_override = Some(instance.into());
        self
    }
}

#[async_trait::async_trait]
impl SiteAdapter for MisskeyAdapter {
    fn identifier(&self) -> &'static str {
        "Misskey"
    }

    fn pattern(&self) -> &str {
        misskey_pattern()
    }

    fn regex(&self) -> &Regex {
        MISSKEY_REGEX.get_or_init(|| {
            build_site_regex(misskey_pattern()).expect("Invalid Misskey regex pattern")
        })
    }

    fn color(&self) -> Color {
        Color(0x85B300)
    }

    async fn process(
        &self,
        matched: &SiteMatch,
        source: Option<&dyn SourceMessage>,
    ) -> ProcessorResultType {
        let (Some(instance), Some(id)) = (matched.name("url"), matched.name("id")) else {
            return Err(ProcessorError::new("无法从Misskey链接中提取帖子信息"));
        };
        let api_instance = self.instance_override.as_deref().unwrap_or(instance);

        let Some(note) = self.client.show_note(api_instance, id).await? else {
            return Ok(None);
        };

        let has_native_embed = match source {
            Some(source) => {
                // 等待平台生成预览后重新检查来源消息
                tokio::time::sleep(self.embed_delay).await;
                source.has_native_embeds().await
            }
            None => false,
        };

        if has_native_embed && !note.needs_embed() {
            log::debug!("Misskey note {} already has a native embed", note.id);
            return Ok(None);
        }

        Ok(Some(build_response(
            matched.as_str(),
            instance,
            &note,
            self.color(),
        )))
    }
}
