use serde::Deserialize;

/// notes/show 返回的帖子
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MisskeyNote {
    pub id: String,
    pub created_at: String,
    pub text: Option<String>,
    pub user: MisskeyUser,
    #[serde(default)]
    pub files: Vec<MisskeyFile>,
}

impl MisskeyNote {
    /// 平台原生预览只显示第一张且不处理敏感内容
    pub fn needs_embed(&self) -> bool {
        self.files.len() > 1 || self.files.iter().any(|f| f.is_sensitive)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MisskeyUser {
    pub name: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MisskeyFile {
    #[serde(rename = "type")]
    pub mime_type: String,
    pub url: String,
    #[serde(default)]
    pub is_sensitive: bool,
}

impl MisskeyFile {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}
