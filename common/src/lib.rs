//! 共用工具函数库
//!
//! 这个模块包含了所有站点适配器共用的协议、模型与工具函数：
//!
//! - [`models`] - 适配器 trait 与统一输出模型
//! - [`resilience`] - 缓存 → 回退 → 重试 → 超时的请求管线
//! - [`cache`] - 缓存协作者
//! - [`normalize`] - 输出归一化的共用策略
//! - [`http`] - 状态码分类与下载
use regex::{Regex, RegexBuilder};
use url::Url;

pub mod cache;
pub mod error;
pub mod http;
pub mod models;
pub mod normalize;
pub mod resilience;
pub mod settings;

pub use cache::{CacheManager, CacheStore, MemoryCache, cache_key};
pub use error::{FetchError, FetchResult};
pub use models::*;
pub use resilience::{ResiliencePolicy, ResilientFetch, RetryEvent, decode_payload};
pub use settings::{ChannelConfig, ChannelSettings, GlobalDefaults};

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024; // 10MB
pub const GENERAL_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";
pub const BOT_UA: &str = concat!("saucebot/", env!("CARGO_PKG_VERSION"));
pub const SUMMARY_MAX_LENGTH: usize = 600;
pub const SUMMARY_MAX_MAX_LENGTH: usize = 800;

/// 获取环境变量的值
pub fn get_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// 编译站点正则：忽略大小写、多行模式
pub fn build_site_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
}

/// 截断描述文本到指定长度
pub fn substring_desc(desc: &str) -> String {
    let chars: Vec<char> = desc.chars().collect();

    // 如果字符数没有超过最大长度，直接返回
    if chars.len() <= SUMMARY_MAX_LENGTH {
        return desc.trim().to_string();
    }

    // 在最大长度之后查找换行符
    let cr_pos = chars[SUMMARY_MAX_LENGTH..]
        .iter()
        .position(|c| *c == '\n')
        .map(|offset| offset + SUMMARY_MAX_LENGTH);

    match cr_pos {
        Some(pos) if pos < SUMMARY_MAX_MAX_LENGTH => {
            // 换行符在最大长度和极限长度之间，裁剪到换行符
            chars[..pos].iter().collect::<String>().trim().to_string()
        }
        _ => {
            let truncated: String = chars[..SUMMARY_MAX_LENGTH].iter().collect();
            format!("{}……", truncated.trim())
        }
    }
}

/// 将字节数转换为人类可读的格式
pub fn convert_bytes<T: Into<f64>>(bytes: T) -> String {
    human_bytes::human_bytes(bytes.into())
}

/// 从URL中提取文件名，如果无法提取则根据content-type生成默认文件名
pub fn extract_filename_from_url(url: &str, content_type: &str) -> String {
    use std::path::Path;

    if let Ok(parsed_url) = Url::parse(url) {
        let path = parsed_url.path();
        if let Some(filename) = Path::new(path).file_name().and_then(|f| f.to_str()) {
            if !filename.is_empty() && filename != "/" {
                return filename.to_string();
            }
        }
    }

    get_file_extension_from_content_type(content_type)
}

/// 根据URL的文件扩展名推断Content-Type
pub fn guess_content_type_from_url(url: &str) -> Option<String> {
    let parsed_url = Url::parse(url).ok()?;
    guess_content_type_from_file_name(parsed_url.path())
}

/// 根据文件名的扩展名推断Content-Type
pub fn guess_content_type_from_file_name(file_name: &str) -> Option<String> {
    use std::path::Path;

    let extension = Path::new(file_name).extension()?.to_str()?;

    let content_type = match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    };
    Some(content_type.to_string())
}

/// 根据content-type获取对应的文件名
pub fn get_file_extension_from_content_type(content_type: &str) -> String {
    let extension = match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        ct if ct.starts_with("image/") => "jpg",
        "video/webm" => "webm",
        ct if ct.starts_with("video/") => "mp4",
        "application/zip" => "zip",
        _ => "bin",
    };

    format!("file.{}", extension)
}
