use std::path::Path;

use chrono::{DateTime, Utc};
use common::normalize::image_set_note;
use common::{Color, Embed, EmbedAuthor, ProcessResponse};
use url::Url;

use crate::models::ArtStationProject;

fn cover_file_name(cover_url: &str) -> Option<String> {
    let parsed = Url::parse(cover_url).ok()?;
    let name = Path::new(parsed.path()).file_name()?.to_str()?;
    (!name.is_empty()).then(|| name.to_string())
}

/// 多资源项目的卡片
///
/// 平台已为第一个资源生成预览，因此只有一个资源时返回 `None`，
/// 否则在上限内跳过第一个资源、非图片资源以及封面。
pub fn build_response(
    project: &ArtStationProject,
    limit: usize,
    color: Color,
) -> Option<ProcessResponse> {
    let total = project.assets.len();
    if total == 1 {
        return None;
    }

    let mut response = ProcessResponse::new();
    if total > limit {
        response.text = Some(image_set_note(total));
    }

    let cover = cover_file_name(&project.cover_url);
    let timestamp = project
        .published_at
        .as_deref()
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|d| d.with_timezone(&Utc));

    for asset in project.assets.iter().take(limit).skip(1) {
        if !asset.is_displayable() {
            continue;
        }
        if cover
            .as_deref()
            .is_some_and(|cover| asset.image_url.contains(cover))
        {
            continue;
        }

        let title = asset
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&project.title);

        let embed = Embed::new(color)
            .title(title)
            .url(&project.permalink)
            .timestamp(timestamp)
            .image(&asset.image_url)
            .author(EmbedAuthor {
                name: project.user.full_name.clone(),
                icon_url: project.user.medium_avatar_url.clone(),
                url: project.user.permalink.clone(),
            })
            .field("Views", project.views_count, true)
            .field("Likes", project.likes_count, true);

        response.embeds.push(embed);
    }

    Some(response)
}
