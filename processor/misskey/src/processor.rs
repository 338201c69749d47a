use chrono::{DateTime, Utc};
use common::{Color, Embed, EmbedAuthor, ProcessResponse};

use crate::models::MisskeyNote;

pub const MISSKEY_ICON_URL: &str = "https://misskey-hub.net/favicon.ico";

/// 每个图片文件一张卡片，其他类型的文件忽略
pub fn build_response(
    link: &str,
    instance: &str,
    note: &MisskeyNote,
    color: Color,
) -> ProcessResponse {
    let user = &note.user;
    let display_name = user.name.as_deref().unwrap_or(&user.username);
    let timestamp = DateTime::parse_from_rfc3339(&note.created_at)
        .map(|d| d.with_timezone(&Utc))
        .ok();

    let embeds = note
        .files
        .iter()
        .filter(|file| file.is_image())
        .map(|file| {
            Embed::new(color)
                .url(link)
                .timestamp(timestamp)
                .description(note.text.clone().unwrap_or_default())
                .author(EmbedAuthor {
                    name: format!("{} ({})", display_name, user.username),
                    icon_url: user.avatar_url.clone(),
                    url: Some(format!("{}/@{}", instance, user.username)),
                })
                .image(&file.url)
                .footer("Misskey", Some(MISSKEY_ICON_URL))
        })
        .collect();

    ProcessResponse {
        embeds,
        ..Default::default()
    }
}
