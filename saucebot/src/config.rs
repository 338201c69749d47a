//! 频道配置与站点开关

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Context;
use common::{ChannelConfig, get_env_var};

/// 按频道读取配置
#[async_trait::async_trait]
pub trait ChannelConfigProvider: Send + Sync {
    async fn get_by_channel(&self, channel_id: i64) -> Option<ChannelConfig>;
}

/// 启动时从 JSON 文件读取的只读配置
///
/// 文件格式为 `{ "<chat id>": { "maximumEmbeds": 4, ... } }`。
#[derive(Debug, Default)]
pub struct JsonFileConfigProvider {
    channels: HashMap<i64, ChannelConfig>,
}

impl JsonFileConfigProvider {
    pub fn new(channels: HashMap<i64, ChannelConfig>) -> Self {
        Self { channels }
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let parsed: HashMap<String, ChannelConfig> =
            serde_json::from_str(raw).context("Invalid channel configuration JSON")?;

        let mut channels = HashMap::with_capacity(parsed.len());
        for (key, config) in parsed {
            let channel_id = key
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Invalid chat id in channel configuration: {}", key))?;
            channels.insert(channel_id, config);
        }

        Ok(Self::new(channels))
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read channel configuration {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// 读取 `CHANNEL_CONFIG_FILE`，未设置时所有频道使用全局默认值
    pub fn from_env() -> anyhow::Result<Self> {
        match get_env_var("CHANNEL_CONFIG_FILE").filter(|p| !p.trim().is_empty()) {
            Some(path) => {
                let provider = Self::from_file(path.trim())?;
                log::info!("Loaded configuration for {} channels", provider.len());
                Ok(provider)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[async_trait::async_trait]
impl ChannelConfigProvider for JsonFileConfigProvider {
    async fn get_by_channel(&self, channel_id: i64) -> Option<ChannelConfig> {
        self.channels.get(&channel_id).cloned()
    }
}

/// 逗号分隔的站点标识，区分大小写
pub fn parse_disabled_sites(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn disabled_sites_from_env() -> HashSet<String> {
    get_env_var("DISABLED_SITES")
        .map(|raw| parse_disabled_sites(&raw))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_disabled_sites() {
        let disabled = parse_disabled_sites(" Pixiv, ,Twitter ,pixiv");
        assert_eq!(disabled.len(), 3);
        assert!(disabled.contains("Pixiv"));
        assert!(disabled.contains("pixiv"));
        assert!(disabled.contains("Twitter"));
        assert!(parse_disabled_sites("").is_empty());
    }

    #[tokio::test]
    async fn test_json_provider() {
        let provider = JsonFileConfigProvider::from_json(
            r#"{"-1001234": {"maximumEmbeds": 2, "sendMatchedMessage": true}, "42": {}}"#,
        )
        .unwrap();
        assert_eq!(provider.len(), 2);

        let config = provider.get_by_channel(-1001234).await.unwrap();
        assert_eq!(config.maximum_embeds, Some(2));
        assert_eq!(config.send_matched_message, Some(true));
        assert_eq!(config.maximum_pixiv_images, None);

        assert_eq!(provider.get_by_channel(42).await, Some(ChannelConfig::default()));
        assert!(provider.get_by_channel(7).await.is_none());
    }

    #[test]
    fn test_invalid_chat_id_is_rejected() {
        assert!(JsonFileConfigProvider::from_json(r#"{"general": {}}"#).is_err());
    }
}
