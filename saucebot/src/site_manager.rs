//! 站点匹配与处理编排
//!
//! [`SiteRegistry`] 按固定顺序持有已启用的适配器，[`SiteManager`] 负责
//! 权限检查、匹配、占位消息以及结果投递。

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use common::{
    ChannelSettings, GlobalDefaults, MatchResult, ProcessResponse, SiteAdapter, SourceMessage,
    find_matches,
};
use regex::{Regex, RegexSet};

use crate::config::ChannelConfigProvider;
use crate::gateway::{
    BotPermissions, ChatGateway, IncomingMessage, PRIVATE_CHAT_PERMISSIONS, PostedMessage,
};

pub const NOTICE_CANNOT_BE_SAUCED: &str = "Provided URL cannot be sauced";
pub const NOTICE_EMBED_FAILED: &str = "Failed to create embed information for provided URL";
pub const NOTICE_NO_PERMISSIONS: &str =
    "Failed to process provided URL or do not have correct permissions in Channel";

// 用 <...> 或 ||...|| 包裹的链接不处理，但 <@提及>、<#频道>、<:表情:> 不算
static IGNORE_REGEX: OnceLock<Regex> = OnceLock::new();

fn ignore_regex() -> &'static Regex {
    IGNORE_REGEX.get_or_init(|| {
        Regex::new(r"(?i)(?:<|\|\|)(?:(?:[^@#:a\n]|a[^:\n]).*|a)?(?:>|\|\|)")
            .expect("Invalid ignore regex pattern")
    })
}

pub fn is_ignored(content: &str) -> bool {
    ignore_regex().is_match(content)
}

pub fn matched_message(site: &str) -> String {
    format!("Matched link to {}, please wait...", site)
}

/// 已启用的适配器，构建后只读
pub struct SiteRegistry {
    adapters: Vec<Box<dyn SiteAdapter>>,
    prefilter: Option<RegexSet>,
}

impl SiteRegistry {
    pub fn new(candidates: Vec<Box<dyn SiteAdapter>>, disabled: &HashSet<String>) -> Self {
        let mut adapters: Vec<Box<dyn SiteAdapter>> = Vec::with_capacity(candidates.len());

        for adapter in candidates {
            let identifier = adapter.identifier();
            if disabled.contains(identifier) {
                log::debug!("Site {} is disabled, skipping", identifier);
                continue;
            }
            if adapters.iter().any(|a| a.identifier() == identifier) {
                log::warn!("Duplicate site identifier {}, skipping", identifier);
                continue;
            }
            log::debug!("Registered site {}", identifier);
            adapters.push(adapter);
        }

        // 与各适配器使用相同的编译选项
        let patterns: Vec<&str> = adapters.iter().map(|a| a.regex().as_str()).collect();
        let prefilter = match regex::RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .multi_line(true)
            .build()
        {
            Ok(set) => Some(set),
            Err(e) => {
                log::warn!("Failed to build site prefilter, matching every site: {}", e);
                None
            }
        };

        Self {
            adapters,
            prefilter,
        }
    }

    pub fn identifiers(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.identifier()).collect()
    }

    pub fn get(&self, site: &str) -> Option<&dyn SiteAdapter> {
        self.adapters
            .iter()
            .find(|a| a.identifier() == site)
            .map(|a| a.as_ref())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// 按注册顺序收集匹配，数量达到 `quota` 后停止
    pub fn match_content(&self, content: &str, quota: usize) -> Vec<MatchResult> {
        let mut results = Vec::new();
        if quota == 0 || content.trim().is_empty() || is_ignored(content) {
            return results;
        }

        let candidates: Vec<usize> = match &self.prefilter {
            Some(set) => set.matches(content).into_iter().collect(),
            None => (0..self.adapters.len()).collect(),
        };

        for index in candidates {
            let adapter = &self.adapters[index];
            for matched in find_matches(adapter.as_ref(), content) {
                log::debug!("Matched link \"{}\" to site {}", matched, adapter.identifier());
                results.push(MatchResult {
                    site: adapter.identifier(),
                    matched,
                });
                if results.len() >= quota {
                    return results;
                }
            }
        }

        results
    }
}

/// 占位消息，离开作用域时删除
///
/// 正常路径调用 [`PlaceholderGuard::release`]；若任务被取消或 panic，
/// `Drop` 会在当前运行时中补发删除请求。
pub struct PlaceholderGuard {
    gateway: Arc<dyn ChatGateway>,
    posted: Option<PostedMessage>,
}

impl PlaceholderGuard {
    /// 发送失败时返回不持有消息的守卫
    pub async fn post(gateway: Arc<dyn ChatGateway>, message: &IncomingMessage, text: &str) -> Self {
        let posted = match gateway.send_placeholder(message, text).await {
            Ok(posted) => Some(posted),
            Err(e) => {
                log::warn!(
                    "Failed to send placeholder in chat {}: {}",
                    message.chat_id,
                    e
                );
                None
            }
        };
        Self { gateway, posted }
    }

    pub async fn release(mut self) {
        if let Some(posted) = self.posted.take() {
            delete_placeholder(self.gateway.as_ref(), &posted).await;
        }
    }
}

impl Drop for PlaceholderGuard {
    fn drop(&mut self) {
        let Some(posted) = self.posted.take() else {
            return;
        };
        let gateway = self.gateway.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    delete_placeholder(gateway.as_ref(), &posted).await;
                });
            }
            Err(_) => log::warn!(
                "Placeholder {} in chat {} left behind, no runtime available",
                posted.message_id,
                posted.chat_id
            ),
        }
    }
}

async fn delete_placeholder(gateway: &dyn ChatGateway, posted: &PostedMessage) {
    if let Err(e) = gateway.delete_message(posted).await {
        log::warn!(
            "Failed to delete placeholder {} in chat {}: {}",
            posted.message_id,
            posted.chat_id,
            e
        );
    }
}

/// 提供给适配器的源消息上下文
struct MessageSource<'a> {
    gateway: &'a dyn ChatGateway,
    message: &'a IncomingMessage,
    settings: &'a ChannelSettings,
}

#[async_trait::async_trait]
impl SourceMessage for MessageSource<'_> {
    fn channel_id(&self) -> i64 {
        self.message.chat_id
    }

    fn settings(&self) -> &ChannelSettings {
        self.settings
    }

    async fn has_native_embeds(&self) -> bool {
        self.gateway.native_embed_count(self.message).await > 0
    }
}

pub struct SiteManager {
    registry: SiteRegistry,
    configs: Arc<dyn ChannelConfigProvider>,
    defaults: GlobalDefaults,
}

impl SiteManager {
    pub fn new(
        registry: SiteRegistry,
        configs: Arc<dyn ChannelConfigProvider>,
        defaults: GlobalDefaults,
    ) -> Self {
        Self {
            registry,
            configs,
            defaults,
        }
    }

    pub async fn settings_for(&self, channel_id: i64) -> ChannelSettings {
        let config = self.configs.get_by_channel(channel_id).await;
        ChannelSettings::resolve(config.as_ref(), &self.defaults)
    }

    /// 按频道配额匹配
    pub async fn match_message(&self, channel_id: i64, content: &str) -> Vec<MatchResult> {
        let settings = self.settings_for(channel_id).await;
        self.registry
            .match_content(content, settings.maximum_embeds as usize)
    }

    /// 私聊直接放行，查询失败视为权限不足
    async fn check_permissions(
        &self,
        gateway: &dyn ChatGateway,
        message: &IncomingMessage,
    ) -> Option<BotPermissions> {
        if message.is_private {
            return Some(PRIVATE_CHAT_PERMISSIONS);
        }

        let scope = message.scope();
        let permissions = match gateway.permissions(message.chat_id, scope).await {
            Ok(permissions) => permissions,
            Err(e) => {
                log::warn!(
                    "Failed to look up permissions in chat {}: {}",
                    message.chat_id,
                    e
                );
                return None;
            }
        };

        if permissions.covers(&BotPermissions::required_for(scope)) {
            Some(permissions)
        } else {
            log::debug!(
                "Missing permissions in chat {} ({:?}): {:?}",
                message.chat_id,
                scope,
                permissions
            );
            None
        }
    }

    pub async fn handle_message(&self, gateway: Arc<dyn ChatGateway>, message: IncomingMessage) {
        if message.content.trim().is_empty() {
            return;
        }

        let Some(permissions) = self.check_permissions(gateway.as_ref(), &message).await else {
            return;
        };

        let settings = self.settings_for(message.chat_id).await;
        let matches = self
            .registry
            .match_content(&message.content, settings.maximum_embeds as usize);
        if matches.is_empty() {
            return;
        }

        let source: &dyn SourceMessage = &MessageSource {
            gateway: gateway.as_ref(),
            message: &message,
            settings: &settings,
        };

        for result in matches {
            let Some(adapter) = self.registry.get(result.site) else {
                continue;
            };

            let placeholder = if settings.send_matched_message {
                Some(
                    PlaceholderGuard::post(gateway.clone(), &message, &matched_message(result.site))
                        .await,
                )
            } else {
                None
            };

            match adapter.process(&result.matched, Some(source)).await {
                Ok(Some(response)) => {
                    self.deliver(gateway.as_ref(), &message, &permissions, &result, &response)
                        .await;
                }
                Ok(None) => {
                    log::debug!("Site {} returned nothing for {}", result.site, result.matched);
                }
                Err(e) => {
                    log::error!(
                        "Failed to process {} with site {}: {}",
                        result.matched,
                        result.site,
                        e
                    );
                }
            }

            if let Some(placeholder) = placeholder {
                placeholder.release().await;
            }
        }
    }

    async fn deliver(
        &self,
        gateway: &dyn ChatGateway,
        message: &IncomingMessage,
        permissions: &BotPermissions,
        result: &MatchResult,
        response: &ProcessResponse,
    ) {
        if let Err(e) = gateway.deliver(message, response).await {
            log::error!(
                "Failed to deliver {} result for {}: {}",
                result.site,
                result.matched,
                e
            );
            return;
        }

        log::info!(
            "Delivered {} result for {} to chat {}",
            result.site,
            result.matched,
            message.chat_id
        );

        if permissions.manage_messages
            && let Err(e) = gateway.suppress_embeds(message).await
        {
            log::warn!("Failed to suppress embeds in chat {}: {}", message.chat_id, e);
        }
    }

    pub async fn handle_command(
        &self,
        gateway: Arc<dyn ChatGateway>,
        message: IncomingMessage,
        argument: &str,
    ) {
        let gateway = gateway.as_ref();

        if self.check_permissions(gateway, &message).await.is_none() {
            reply_notice(gateway, &message, NOTICE_NO_PERMISSIONS).await;
            return;
        }

        let matches = self.match_message(message.chat_id, argument).await;
        if matches.is_empty() {
            reply_notice(gateway, &message, NOTICE_CANNOT_BE_SAUCED).await;
            return;
        }

        for result in matches {
            let Some(adapter) = self.registry.get(result.site) else {
                continue;
            };

            let response = match adapter.process(&result.matched, None).await {
                Ok(Some(response)) => response,
                Ok(None) => {
                    log::debug!("Site {} returned nothing for {}", result.site, result.matched);
                    reply_notice(gateway, &message, NOTICE_EMBED_FAILED).await;
                    continue;
                }
                Err(e) => {
                    log::error!(
                        "Failed to process {} with site {}: {}",
                        result.matched,
                        result.site,
                        e
                    );
                    reply_notice(gateway, &message, NOTICE_EMBED_FAILED).await;
                    continue;
                }
            };

            match gateway.deliver_command(&message, &response).await {
                Ok(()) => log::info!(
                    "Delivered {} result for {} to chat {}",
                    result.site,
                    result.matched,
                    message.chat_id
                ),
                Err(e) => {
                    log::error!(
                        "Failed to deliver {} result for {}: {}",
                        result.site,
                        result.matched,
                        e
                    );
                    reply_notice(gateway, &message, NOTICE_EMBED_FAILED).await;
                }
            }
        }
    }
}

async fn reply_notice(gateway: &dyn ChatGateway, message: &IncomingMessage, text: &str) {
    if let Err(e) = gateway.reply_notice(message, text).await {
        log::warn!("Failed to send notice in chat {}: {}", message.chat_id, e);
    }
}
