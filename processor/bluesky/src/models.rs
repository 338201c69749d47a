use serde::Deserialize;

/// VixBluesky JSON 响应
#[derive(Debug, Deserialize)]
pub struct VixBlueskyResponse {
    #[serde(default)]
    pub posts: Vec<VixBlueskyPost>,
}

#[derive(Debug, Deserialize)]
pub struct VixBlueskyPost {
    pub author: VixBlueskyUser,
    pub record: VixBlueskyRecord,
    pub embed: Option<VixBlueskyEmbed>,
    #[serde(rename = "replyCount", default)]
    pub replies: u64,
    #[serde(rename = "repostCount", default)]
    pub reposts: u64,
    #[serde(rename = "likeCount", default)]
    pub likes: u64,
    #[serde(rename = "quoteCount", default)]
    pub quotes: u64,
}

#[derive(Debug, Deserialize)]
pub struct VixBlueskyUser {
    pub handle: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "avatar")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VixBlueskyRecord {
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct VixBlueskyEmbed {
    #[serde(rename = "$type", default)]
    pub kind: String,
    // app.bsky.embed.video#view
    pub playlist: Option<String>,
    // app.bsky.embed.images#view
    pub images: Option<Vec<VixBlueskyEmbedImage>>,
}

#[derive(Debug, Deserialize)]
pub struct VixBlueskyEmbedImage {
    #[serde(alias = "thumbnail")]
    pub thumb: Option<String>,
    #[serde(rename = "fullsize")]
    pub url: String,
}
