//! 频道级配置与全局默认值

use serde::Deserialize;

use crate::get_env_var;

pub const DEFAULT_MAXIMUM_EMBEDS: u32 = 8;
pub const DEFAULT_MAXIMUM_PIXIV_IMAGES: u32 = 5;

/// 单个频道保存的配置，未设置的字段回落到全局默认值
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    pub maximum_embeds: Option<u32>,
    pub send_matched_message: Option<bool>,
    pub maximum_pixiv_images: Option<u32>,
}

/// 全局默认值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDefaults {
    pub maximum_embeds: u32,
    pub send_matched_message: bool,
    pub maximum_pixiv_images: u32,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            maximum_embeds: DEFAULT_MAXIMUM_EMBEDS,
            send_matched_message: false,
            maximum_pixiv_images: DEFAULT_MAXIMUM_PIXIV_IMAGES,
        }
    }
}

impl GlobalDefaults {
    /// 从环境变量读取，解析失败的值使用默认值
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            maximum_embeds: env_parse("MAXIMUM_EMBEDS").unwrap_or(defaults.maximum_embeds),
            send_matched_message: env_parse("SEND_MATCHED_MESSAGE")
                .unwrap_or(defaults.send_matched_message),
            maximum_pixiv_images: env_parse("PIXIV_POST_LIMIT")
                .unwrap_or(defaults.maximum_pixiv_images),
        }
    }
}

/// 解析后的频道配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    pub maximum_embeds: u32,
    pub send_matched_message: bool,
    pub maximum_pixiv_images: u32,
}

impl ChannelSettings {
    pub fn resolve(config: Option<&ChannelConfig>, defaults: &GlobalDefaults) -> Self {
        let config = config.cloned().unwrap_or_default();
        Self {
            maximum_embeds: config.maximum_embeds.unwrap_or(defaults.maximum_embeds),
            send_matched_message: config
                .send_matched_message
                .unwrap_or(defaults.send_matched_message),
            maximum_pixiv_images: config
                .maximum_pixiv_images
                .unwrap_or(defaults.maximum_pixiv_images),
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::resolve(None, &GlobalDefaults::default())
    }
}

/// 读取并解析环境变量
pub fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = get_env_var(name)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!("Ignoring invalid value for {}: {:?}", name, value);
            None
        }
    }
}
