use common::normalize::{cap_pages, select_usable_asset};
use common::{FileAttachment, MAX_FILE_SIZE, ProcessResponse, ProcessorResultType};

use crate::api::PixivApi;
use crate::models::IllustrationDetails;
use crate::utils::{page_file_name, ugoira_redirect};

/// 处理一个作品
pub async fn process_illustration(
    api: &dyn PixivApi,
    id: &str,
    post_limit: usize,
) -> ProcessorResultType {
    if !api.login().await {
        log::error!("Pixiv login check failed, cookie may be expired or invalid.");
        return Ok(None);
    }

    let Some(details) = api.illustration_details(id).await? else {
        return Ok(None);
    };

    if details.is_ugoira() {
        log::debug!("Pixiv {} is an ugoira, redirecting", id);
        return Ok(Some(ProcessResponse::text(ugoira_redirect(&details.id))));
    }

    process_image(api, &details, post_limit).await.map(Some)
}

async fn process_image(
    api: &dyn PixivApi,
    details: &IllustrationDetails,
    post_limit: usize,
) -> Result<ProcessResponse, common::ProcessorError> {
    let mut response = ProcessResponse::new();

    if details.page_count <= 1 {
        if let Some(url) = highest_usable_quality(api, details.urls.candidates()).await {
            response.files.extend(get_file(api, &url).await?);
        }
        return Ok(response);
    }

    let Some(pages) = api.illustration_pages(&details.id).await? else {
        return Ok(response);
    };

    let cap = cap_pages(details.page_count, post_limit);

    for page in pages.iter().take(cap.take) {
        let Some(url) = highest_usable_quality(api, page.urls.candidates()).await else {
            continue;
        };
        response.files.extend(get_file(api, &url).await?);
    }

    response.text = cap.note;
    Ok(response)
}

async fn highest_usable_quality(api: &dyn PixivApi, candidates: Vec<String>) -> Option<String> {
    select_usable_asset(candidates, MAX_FILE_SIZE as u64, |url| async move {
        api.poke_file(&url).await
    })
    .await
}

async fn get_file(
    api: &dyn PixivApi,
    url: &str,
) -> Result<Option<FileAttachment>, common::ProcessorError> {
    let bytes = api.get_file(url).await?;
    if bytes.is_none() {
        log::debug!("{} disappeared before it could be downloaded", url);
    }

    Ok(bytes.map(|bytes| FileAttachment {
        bytes,
        file_name: page_file_name(url),
    }))
}
