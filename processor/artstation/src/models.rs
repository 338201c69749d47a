use serde::Deserialize;

/// projects/{hash}.json
#[derive(Debug, Deserialize)]
pub struct ArtStationProject {
    #[serde(default)]
    pub title: String,
    pub permalink: String,
    pub published_at: Option<String>,
    #[serde(default)]
    pub views_count: u64,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub cover_url: String,
    pub user: ArtStationUser,
    #[serde(default)]
    pub assets: Vec<ArtStationAsset>,
}

#[derive(Debug, Deserialize)]
pub struct ArtStationUser {
    pub full_name: String,
    pub permalink: Option<String>,
    pub medium_avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArtStationAsset {
    pub asset_type: String,
    #[serde(default)]
    pub image_url: String,
    pub title: Option<String>,
}

impl ArtStationAsset {
    /// 目前只能展示图片
    pub fn is_displayable(&self) -> bool {
        matches!(self.asset_type.as_str(), "image" | "cover")
    }
}
