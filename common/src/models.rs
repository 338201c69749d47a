use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};

use crate::settings::ChannelSettings;

/// 展示用强调色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    pub const DEFAULT: Color = Color(0);
}

impl Default for Color {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// 一次正则匹配的快照，脱离原始文本的生命周期
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMatch {
    value: String,
    start: usize,
    end: usize,
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl SiteMatch {
    pub fn from_captures(regex: &Regex, captures: &Captures<'_>) -> Self {
        let whole = captures.get(0);
        let groups = captures
            .iter()
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();

        Self {
            value: whole.map(|m| m.as_str().to_string()).unwrap_or_default(),
            start: whole.map(|m| m.start()).unwrap_or_default(),
            end: whole.map(|m| m.end()).unwrap_or_default(),
            groups,
            named,
        }
    }

    /// 完整匹配文本
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// 按序号取捕获组，0 为完整匹配
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    /// 按名称取捕获组
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

impl std::fmt::Display for SiteMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// 匹配结果：站点标识 + 匹配
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub site: &'static str,
    pub matched: SiteMatch,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedAuthor {
    pub name: String,
    pub icon_url: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedFooter {
    pub icon_url: Option<String>,
    pub text: String,
}

/// 统一的卡片描述
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Embed {
    pub title: Option<String>,
    pub url: Option<String>,
    pub color: Color,
    pub timestamp: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub author: Option<EmbedAuthor>,
    pub fields: Vec<EmbedField>,
    pub image_url: Option<String>,
    pub footer: Option<EmbedFooter>,
}

impl Embed {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn author(mut self, author: EmbedAuthor) -> Self {
        self.author = Some(author);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl ToString, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.to_string(),
            inline,
        });
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn footer(mut self, text: impl Into<String>, icon_url: Option<&str>) -> Self {
        self.footer = Some(EmbedFooter {
            icon_url: icon_url.map(str::to_string),
            text: text.into(),
        });
        self
    }
}

/// 需要直接上传的文件
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttachment {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// 处理器的统一输出
///
/// 三者皆空也是合法结果，表示"已处理，但没有可展示的内容"。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessResponse {
    pub embeds: Vec<Embed>,
    pub files: Vec<FileAttachment>,
    pub text: Option<String>,
}

impl ProcessResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只含一段文本的结果（重定向链接等）
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.embeds.is_empty() && self.files.is_empty() && self.text.is_none()
    }
}

/// 统一的处理器错误类型
#[derive(Debug, Clone)]
pub struct ProcessorError {
    pub message: String,
    pub source: Option<String>,
}

impl std::fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProcessorError {}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl ToString) -> Self {
        Self {
            message: message.into(),
            source: Some(source.to_string()),
        }
    }
}

impl From<anyhow::Error> for ProcessorError {
    fn from(error: anyhow::Error) -> Self {
        ProcessorError::new(error.to_string())
    }
}

impl From<crate::FetchError> for ProcessorError {
    fn from(error: crate::FetchError) -> Self {
        ProcessorError::with_source("上游请求失败", error)
    }
}

/// `Ok(None)` 表示上游资源无法展示（已删除、不支持、登录失败），不是错误
pub type ProcessorResultType = Result<Option<ProcessResponse>, ProcessorError>;

/// 触发匹配的源消息上下文
#[async_trait::async_trait]
pub trait SourceMessage: Send + Sync {
    /// 源消息所在频道
    fn channel_id(&self) -> i64;

    /// 已解析的频道配置
    fn settings(&self) -> &ChannelSettings;

    /// 重新检查源消息当前是否已带有平台原生预览
    async fn has_native_embeds(&self) -> bool;
}

/// 统一的站点适配器 trait
#[async_trait::async_trait]
pub trait SiteAdapter: Send + Sync {
    /// 站点标识，在注册表内唯一
    fn identifier(&self) -> &'static str;

    /// 获取正则表达式模式字符串
    fn pattern(&self) -> &str;

    /// 编译后的正则（见 [`crate::build_site_regex`]）
    fn regex(&self) -> &Regex;

    /// 展示强调色
    fn color(&self) -> Color {
        Color::DEFAULT
    }

    /// 处理一次匹配
    async fn process(
        &self,
        matched: &SiteMatch,
        source: Option<&dyn SourceMessage>,
    ) -> ProcessorResultType;
}

/// 返回适配器在文本中的全部不重叠匹配
pub fn find_matches(adapter: &dyn SiteAdapter, text: &str) -> Vec<SiteMatch> {
    let regex = adapter.regex();
    regex
        .captures_iter(text)
        .map(|captures| SiteMatch::from_captures(regex, &captures))
        .collect()
}
