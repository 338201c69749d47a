//! HTTP 请求辅助函数，把响应状态映射为 [`FetchError`]

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use crate::error::{FetchError, FetchResult};
use crate::{GENERAL_UA, MAX_FILE_SIZE, convert_bytes};

/// 客户端级整体超时，管线的单次超时通常更短
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 构建带 UA 的默认客户端
pub fn build_client(user_agent: &str) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
}

pub fn default_client() -> reqwest::Result<Client> {
    build_client(GENERAL_UA)
}

fn map_transport(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(REQUEST_TIMEOUT)
    } else {
        FetchError::Network(error)
    }
}

/// 发送请求并检查状态码
pub async fn send(request: RequestBuilder, url: &str) -> FetchResult<Response> {
    let response = request.send().await.map_err(map_transport)?;
    match FetchError::from_status(response.status(), url) {
        Some(error) => Err(error),
        None => Ok(response),
    }
}

/// GET 并返回文本
pub async fn get_text(client: &Client, url: &str) -> FetchResult<String> {
    log::debug!("GET {}", url);
    let response = send(client.get(url), url).await?;
    response.text().await.map_err(map_transport)
}

/// 发送任意请求并返回文本
pub async fn request_text(request: RequestBuilder, url: &str) -> FetchResult<String> {
    let response = send(request, url).await?;
    response.text().await.map_err(map_transport)
}

/// HEAD 探测文件大小，缺少 Content-Length 时返回 `None`
pub async fn probe_content_length(client: &Client, url: &str) -> FetchResult<Option<u64>> {
    let response = send(client.head(url), url).await?;
    let size = response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match size {
        Some(size) => log::debug!("File size of {}: {}", url, convert_bytes(size as f64)),
        None => log::debug!("Content-Length header not found for {}", url),
    }

    Ok(size)
}

fn too_large(url: &str, size: u64) -> FetchError {
    FetchError::Status {
        status: 413,
        url: format!(
            "{} ({} exceeds {})",
            url,
            convert_bytes(size as f64),
            convert_bytes(MAX_FILE_SIZE as f64)
        ),
    }
}

/// 下载文件，超过 [`MAX_FILE_SIZE`] 视为错误
///
/// 有 Content-Length 时先检查大小，不读取过大的响应体。
pub async fn download(client: &Client, url: &str) -> FetchResult<Vec<u8>> {
    log::debug!("Starting download from: {}", url);
    let response = send(client.get(url), url).await?;

    if let Some(size) = response.content_length()
        && size > MAX_FILE_SIZE as u64
    {
        return Err(too_large(url, size));
    }

    let bytes = response.bytes().await.map_err(map_transport)?;
    if bytes.len() > MAX_FILE_SIZE {
        return Err(too_large(url, bytes.len() as u64));
    }

    log::debug!("Successfully downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
