use chrono::{DateTime, Utc};
use common::normalize::MediaKind;
use common::{Color, Embed, EmbedAuthor, ProcessResponse};

use crate::models::{VixBlueskyEmbedImage, VixBlueskyPost};

pub const BLUESKY_ICON_URL: &str = "https://bsky.app/static/apple-touch-icon.png";
const VIDEO_RENDERER_URL: &str = "https://bskyx.app";

/// 把帖子归一化为统一输出
///
/// 有视频时只输出渲染器链接，即使同时带有图片也不会再生成图集。
pub fn build_response(user: &str, id: &str, post: &VixBlueskyPost, color: Color) -> ProcessResponse {
    let url = format!("https://bsky.app/profile/{}/post/{}", user, id);
    let images = post
        .embed
        .as_ref()
        .and_then(|e| e.images.as_deref())
        .unwrap_or_default();
    let has_video = post.embed.as_ref().is_some_and(|e| e.playlist.is_some());

    match MediaKind::choose(has_video, images.len()) {
        MediaKind::Video => {
            log::debug!("Processing as video redirect");
            ProcessResponse::text(format!("{}/profile/{}/post/{}", VIDEO_RENDERER_URL, user, id))
        }
        MediaKind::Carousel | MediaKind::SingleImage => {
            log::debug!("Processing as photo embed");
            handle_photo(&url, post, images, color)
        }
        MediaKind::TextOnly => ProcessResponse {
            embeds: vec![base_embed(&url, post, color)],
            ..Default::default()
        },
    }
}

fn handle_photo(
    url: &str,
    post: &VixBlueskyPost,
    images: &[VixBlueskyEmbedImage],
    color: Color,
) -> ProcessResponse {
    let embeds = images
        .iter()
        .map(|image| base_embed(url, post, color).image(&image.url))
        .collect();

    ProcessResponse {
        embeds,
        ..Default::default()
    }
}

fn base_embed(url: &str, post: &VixBlueskyPost, color: Color) -> Embed {
    let author = &post.author;
    let name = match author.display_name.as_deref().map(str::trim) {
        Some(display) if !display.is_empty() => format!("{} (@{})", display, author.handle),
        _ => format!("@{}", author.handle),
    };

    Embed::new(color)
        .url(url)
        .timestamp(parse_timestamp(&post.record.created_at))
        .description(&post.record.text)
        .author(EmbedAuthor {
            name,
            icon_url: author.avatar_url.clone(),
            url: Some(format!("https://bsky.app/profile/{}", author.handle)),
        })
        .field("Replies", post.replies, true)
        .field("Reposts", post.reposts, true)
        .field("Quotes", post.quotes, true)
        .field("Likes", post.likes, true)
        .footer("Bluesky", Some(BLUESKY_ICON_URL))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .ok()
}
