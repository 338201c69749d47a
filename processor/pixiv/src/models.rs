use serde::Deserialize;

/// 动图作品类型
pub const ILLUST_TYPE_UGOIRA: u8 = 2;

/// Pixiv Ajax API 响应外壳
#[derive(Debug, Deserialize)]
pub struct PixivApiResponse<T> {
    pub error: bool,
    #[serde(default)]
    pub message: String,
    pub body: Option<T>,
}

impl<T> PixivApiResponse<T> {
    /// 出错的响应视为没有内容
    pub fn into_body(self) -> Option<T> {
        if self.error {
            log::debug!("Pixiv API error: {}", self.message);
            return None;
        }
        self.body
    }
}

/// Pixiv 作品信息
#[derive(Debug, Clone, Deserialize)]
pub struct IllustrationDetails {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 0、1 为插画，2 为动图
    #[serde(rename = "illustType", default)]
    pub illust_type: u8,
    pub urls: IllustrationUrls,
    #[serde(rename = "pageCount")]
    pub page_count: usize,
}

impl IllustrationDetails {
    pub fn is_ugoira(&self) -> bool {
        self.illust_type == ILLUST_TYPE_UGOIRA
    }
}

/// 受限作品的各级链接都可能为 null
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IllustrationUrls {
    pub mini: Option<String>,
    pub thumb: Option<String>,
    pub small: Option<String>,
    pub regular: Option<String>,
    pub original: Option<String>,
}

impl IllustrationUrls {
    /// 从高到低的清晰度
    pub fn candidates(&self) -> Vec<String> {
        [
            &self.original,
            &self.regular,
            &self.small,
            &self.thumb,
            &self.mini,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IllustrationPage {
    pub urls: IllustrationPageUrls,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IllustrationPageUrls {
    pub thumb_mini: Option<String>,
    pub small: Option<String>,
    pub regular: Option<String>,
    pub original: Option<String>,
}

impl IllustrationPageUrls {
    pub fn candidates(&self) -> Vec<String> {
        [&self.original, &self.regular, &self.small, &self.thumb_mini]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}
