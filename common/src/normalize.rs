//! 输出归一化的共用策略

use std::future::Future;

/// 同一帖子提供多种媒体时的展示形式，按优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Carousel,
    SingleImage,
    TextOnly,
}

impl MediaKind {
    /// 视频 > 多图 > 单图 > 纯文本
    pub fn choose(has_video: bool, image_count: usize) -> Self {
        match (has_video, image_count) {
            (true, _) => Self::Video,
            (false, 0) => Self::TextOnly,
            (false, 1) => Self::SingleImage,
            (false, _) => Self::Carousel,
        }
    }
}

/// 按从高到低的清晰度依次探测，返回第一个大小低于 `ceiling` 的候选
///
/// 探测不到大小的候选视为不可用。
pub async fn select_usable_asset<I, S, F, Fut>(candidates: I, ceiling: u64, probe: F) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Option<u64>>,
{
    for candidate in candidates {
        let url = candidate.as_ref();
        if url.is_empty() {
            continue;
        }

        log::debug!("Checking {} for usable quality...", url);

        match probe(url.to_string()).await {
            Some(size) if size < ceiling => return Some(url.to_string()),
            Some(size) => log::debug!("{} is too large ({} bytes)", url, size),
            None => log::debug!("{} has no usable size", url),
        }
    }

    None
}

/// 多页作品的截断结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCap {
    pub take: usize,
    pub note: Option<String>,
}

/// 超过上限时只取前 `limit` 页，并附带总数说明
pub fn cap_pages(total: usize, limit: usize) -> PageCap {
    PageCap {
        take: total.min(limit),
        note: (total > limit).then(|| image_set_note(total)),
    }
}

pub fn image_set_note(total: usize) -> String {
    format!("This is part of a {} image set.", total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_precedence() {
        assert_eq!(MediaKind::choose(true, 4), MediaKind::Video);
        assert_eq!(MediaKind::choose(false, 4), MediaKind::Carousel);
        assert_eq!(MediaKind::choose(false, 1), MediaKind::SingleImage);
        assert_eq!(MediaKind::choose(false, 0), MediaKind::TextOnly);
    }

    #[tokio::test]
    async fn test_quality_ladder_picks_first_under_ceiling() {
        let candidates = ["original.png", "regular.jpg", "small.jpg"];
        let picked = select_usable_asset(candidates, 100, |url| async move {
            match url.as_str() {
                "original.png" => Some(500),
                "regular.jpg" => Some(99),
                _ => Some(1),
            }
        })
        .await;
        assert_eq!(picked.as_deref(), Some("regular.jpg"));
    }

    #[tokio::test]
    async fn test_quality_ladder_omits_when_nothing_fits() {
        let candidates = vec!["a".to_string(), "b".to_string()];
        let picked = select_usable_asset(candidates, 100, |url| async move {
            (url == "a").then_some(100)
        })
        .await;
        assert_eq!(picked, None);
    }

    #[test]
    fn test_cap_pages() {
        let capped = cap_pages(12, 5);
        assert_eq!(capped.take, 5);
        assert_eq!(capped.note.as_deref(), Some("This is part of a 12 image set."));

        let under = cap_pages(3, 5);
        assert_eq!(under.take, 3);
        assert_eq!(under.note, None);
    }
}
