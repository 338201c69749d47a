use std::sync::Arc;

use anyhow::{Result, anyhow};
use common::{
    Embed, FileAttachment, ProcessResponse, convert_bytes, extract_filename_from_url,
    guess_content_type_from_file_name, guess_content_type_from_url, substring_desc,
};
use teloxide::payloads::{SendAnimation, SendPhoto};
use teloxide::prelude::*;
use teloxide::requests::MultipartRequest;
use teloxide::types::{
    ChatMemberKind, ChatPermissions, InputFile, InputMedia, InputMediaPhoto, Message,
    MessageEntityKind, MessageId, ParseMode, ReplyParameters, UserId,
};
use teloxide::utils::html;

use crate::gateway::{BotPermissions, ChatGateway, ChatScope, IncomingMessage, PostedMessage};
use crate::site_manager::SiteManager;

/// Telegram 单个媒体组的上限
const MEDIA_GROUP_LIMIT: usize = 10;

/// 注入给各处理函数的共享状态
#[derive(Clone)]
pub struct BotState {
    pub manager: Arc<SiteManager>,
    pub gateway: Arc<dyn ChatGateway>,
}

/// 通用的请求配置 trait
trait ApplyMessageSettings<T> {
    fn apply_settings(self, msg: &MessageSenderBuilder) -> T;
}

impl ApplyMessageSettings<MultipartRequest<SendPhoto>> for MultipartRequest<SendPhoto> {
    fn apply_settings(mut self, msg: &MessageSenderBuilder) -> MultipartRequest<SendPhoto> {
        self = self.parse_mode(ParseMode::Html).caption(msg.text.clone());

        if let Some(message_id) = msg.message_id {
            self = self.reply_parameters(ReplyParameters::new(message_id));
        }

        self
    }
}

impl ApplyMessageSettings<MultipartRequest<SendAnimation>> for MultipartRequest<SendAnimation> {
    fn apply_settings(mut self, msg: &MessageSenderBuilder) -> MultipartRequest<SendAnimation> {
        self = self.parse_mode(ParseMode::Html).caption(msg.text.clone());

        if let Some(message_id) = msg.message_id {
            self = self.reply_parameters(ReplyParameters::new(message_id));
        }

        self
    }
}

#[derive(Clone)]
pub struct MessageSenderBuilder {
    chat_id: ChatId,
    message_id: Option<MessageId>,
    text: String,
    urls: Vec<String>,
}

impl MessageSenderBuilder {
    /// chat_id 与 text 是必需的，text 为 HTML
    pub fn new(chat_id: ChatId, text: String) -> Self {
        Self {
            chat_id,
            text,
            message_id: None,
            urls: Vec::new(),
        }
    }

    /// 设置要回复的消息 ID (可选)
    pub fn message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// 设置媒体链接 (可选)，超过媒体组上限时分多组发送
    pub fn urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub async fn send_message(self, bot: &Bot) -> Result<Message> {
        send_message(self, bot).await
    }

    pub async fn send_photo(self, bot: &Bot, http: &reqwest::Client) -> Result<Message> {
        send_photo(self, bot, http).await
    }
}

async fn send_message(msg: MessageSenderBuilder, bot: &Bot) -> Result<Message> {
    log::debug!("send_message: {}\n\t{}", msg.chat_id, msg.text);
    let mut request = bot
        .send_message(msg.chat_id, msg.text)
        .parse_mode(ParseMode::Html);

    if let Some(message_id) = msg.message_id {
        request = request.reply_parameters(ReplyParameters::new(message_id));
    }

    Ok(request.await?)
}

/// 发送图片，自动处理单张、媒体组和分组的情况
async fn send_photo(msg: MessageSenderBuilder, bot: &Bot, http: &reqwest::Client) -> Result<Message> {
    if msg.urls.is_empty() {
        return send_message(msg, bot).await;
    }

    let chunks: Vec<Vec<String>> = msg
        .urls
        .chunks(MEDIA_GROUP_LIMIT)
        .map(<[String]>::to_vec)
        .collect();

    let mut first = None;
    for (index, chunk) in chunks.into_iter().enumerate() {
        // 只有第一组带说明文字
        let text = if index == 0 { msg.text.clone() } else { String::new() };
        let part = MessageSenderBuilder {
            text,
            urls: chunk,
            ..msg.clone()
        };

        let sent = if part.urls.len() == 1 {
            send_single_media(part, bot, http).await?
        } else {
            send_photo_group(part, bot, http).await?
        };
        first.get_or_insert(sent);
    }

    first.ok_or_else(|| anyhow!("No media was sent"))
}

/// 发送单张媒体文件，直接发送URL失败时下载后上传
async fn send_single_media(
    msg: MessageSenderBuilder,
    bot: &Bot,
    http: &reqwest::Client,
) -> Result<Message> {
    log::debug!(
        "send_single_media: {}\n\t{}\n\t{}",
        msg.chat_id,
        msg.text,
        msg.urls.join(", ")
    );

    let url = &msg.urls[0];
    let is_gif = url.ends_with(".gif");

    // 第一次尝试：直接使用URL
    match url.parse::<url::Url>() {
        Ok(parsed) => {
            let input_file = InputFile::url(parsed);
            let direct_result = if is_gif {
                bot.send_animation(msg.chat_id, input_file)
                    .apply_settings(&msg)
                    .await
            } else {
                bot.send_photo(msg.chat_id, input_file)
                    .apply_settings(&msg)
                    .await
            };

            match direct_result {
                Ok(message) => return Ok(message),
                Err(e) => {
                    log::warn!("Direct send failed: {}, trying to download and upload", e);
                }
            }
        }
        Err(e) => log::warn!("Invalid media URL {}: {}, trying to download", url, e),
    }

    // 第二次尝试：下载文件并上传
    let file_bytes = common::http::download(http, url)
        .await
        .map_err(|e| anyhow!("Failed to download and send media: {}", e))?;

    let content_type =
        guess_content_type_from_url(url).unwrap_or_else(|| "application/octet-stream".to_string());
    let file_name = extract_filename_from_url(url, &content_type);

    send_file_upload(
        bot,
        msg.chat_id,
        msg.message_id,
        file_bytes,
        &content_type,
        file_name,
        &msg.text,
    )
    .await
    .map_err(|e| anyhow!("Failed to send media: {}", e))
}

/// 发送多张图片，如果失败则尝试下载并上传
async fn send_photo_group(
    msg: MessageSenderBuilder,
    bot: &Bot,
    http: &reqwest::Client,
) -> Result<Message> {
    log::debug!(
        "send_media_group: {}\n{}\n{}",
        msg.chat_id,
        msg.text,
        msg.urls.join(", ")
    );

    let direct_result = send_media_group_direct(bot, &msg).await;

    let mut messages = match direct_result {
        Ok(messages) => {
            log::info!("Successfully sent media group, total {} files", messages.len());
            messages
        }
        Err(e) => {
            log::warn!(
                "Failed to send media group directly: {}, trying to download and upload",
                e
            );
            send_media_group_with_download(bot, http, &msg).await?
        }
    };

    if messages.is_empty() {
        return Err(anyhow!("Telegram returned no messages for media group"));
    }
    Ok(messages.remove(0))
}

/// 直接发送URL媒体组
async fn send_media_group_direct(bot: &Bot, msg: &MessageSenderBuilder) -> Result<Vec<Message>> {
    let mut media_group = Vec::with_capacity(msg.urls.len());
    for url in &msg.urls {
        let parsed = url.parse::<url::Url>()?;
        media_group.push(InputMedia::Photo(InputMediaPhoto::new(InputFile::url(parsed))));
    }

    set_group_caption(&mut media_group, &msg.text);

    let mut request = bot.send_media_group(msg.chat_id, media_group);
    if let Some(message_id) = msg.message_id {
        request = request.reply_parameters(ReplyParameters::new(message_id));
    }
    Ok(request.await?)
}

/// 通过下载上传的方式发送媒体组
async fn send_media_group_with_download(
    bot: &Bot,
    http: &reqwest::Client,
    msg: &MessageSenderBuilder,
) -> Result<Vec<Message>> {
    let mut media_group = Vec::new();

    for (index, url) in msg.urls.iter().enumerate() {
        log::debug!("Downloading {}/{} file: {}", index + 1, msg.urls.len(), url);

        match common::http::download(http, url).await {
            Ok(file_bytes) => {
                let content_type = guess_content_type_from_url(url)
                    .unwrap_or_else(|| "image/jpeg".to_string());
                let file_name = extract_filename_from_url(url, &content_type);
                let input_file = InputFile::memory(file_bytes).file_name(file_name);
                media_group.push(InputMedia::Photo(InputMediaPhoto::new(input_file)));
            }
            Err(e) => {
                // 存在失败不直接结束，跳过
                log::warn!("Failed to download media file {}: {}", url, e);
            }
        }
    }

    if media_group.is_empty() {
        return Err(anyhow!("Failed to download any media for group"));
    }

    let caption = if media_group.len() != msg.urls.len() {
        log::warn!(
            "Not all media files were downloaded successfully: {}/{}",
            media_group.len(),
            msg.urls.len()
        );
        format!(
            "{}\n[{}/{} Media Downloaded]",
            msg.text,
            media_group.len(),
            msg.urls.len()
        )
    } else {
        msg.text.clone()
    };
    set_group_caption(&mut media_group, &caption);

    log::info!("Sending media group with {} files", media_group.len());
    let mut request = bot.send_media_group(msg.chat_id, media_group);
    if let Some(message_id) = msg.message_id {
        request = request.reply_parameters(ReplyParameters::new(message_id));
    }
    Ok(request.await?)
}

/// 为第一个媒体添加caption
fn set_group_caption(media_group: &mut [InputMedia], caption: &str) {
    if caption.is_empty() {
        return;
    }
    if let Some(InputMedia::Photo(photo)) = media_group.first_mut() {
        photo.caption = Some(caption.to_string());
        photo.parse_mode = Some(ParseMode::Html);
    }
}

/// 根据文件类型上传文件到Telegram
pub async fn send_file_upload(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    file_bytes: Vec<u8>,
    content_type: &str,
    file_name: String,
    caption: &str,
) -> ResponseResult<Message> {
    log::info!(
        "Uploading file {} with size: {}",
        file_name,
        convert_bytes(file_bytes.len() as f64)
    );

    let input_file = InputFile::memory(file_bytes).file_name(file_name);
    let reply_params = message_id.map(ReplyParameters::new);

    match content_type {
        ct if ct.starts_with("image/gif") => {
            let mut request = bot.send_animation(chat_id, input_file);
            if let Some(params) = reply_params {
                request = request.reply_parameters(params);
            }
            request.parse_mode(ParseMode::Html).caption(caption).await
        }
        ct if ct.starts_with("image/") => {
            let mut request = bot.send_photo(chat_id, input_file);
            if let Some(params) = reply_params {
                request = request.reply_parameters(params);
            }
            request.parse_mode(ParseMode::Html).caption(caption).await
        }
        ct if ct.starts_with("video/") => {
            let mut request = bot.send_video(chat_id, input_file);
            if let Some(params) = reply_params {
                request = request.reply_parameters(params);
            }
            request.parse_mode(ParseMode::Html).caption(caption).await
        }
        // 其他文件类型作为文档发送
        _ => {
            let mut request = bot.send_document(chat_id, input_file);
            if let Some(params) = reply_params {
                request = request.reply_parameters(params);
            }
            request.parse_mode(ParseMode::Html).caption(caption).await
        }
    }
}

/// 上传附件，图片合并为媒体组
async fn send_attachments(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    files: &[FileAttachment],
) -> Result<()> {
    let (images, others): (Vec<&FileAttachment>, Vec<&FileAttachment>) =
        files.iter().partition(|f| {
            guess_content_type_from_file_name(&f.file_name)
                .is_some_and(|ct| ct.starts_with("image/") && ct != "image/gif")
        });

    for chunk in images.chunks(MEDIA_GROUP_LIMIT) {
        if let [file] = chunk {
            let content_type = guess_content_type_from_file_name(&file.file_name)
                .unwrap_or_else(|| "image/jpeg".to_string());
            send_file_upload(
                bot,
                chat_id,
                Some(message_id),
                file.bytes.clone(),
                &content_type,
                file.file_name.clone(),
                "",
            )
            .await?;
            continue;
        }

        let media_group = chunk
            .iter()
            .map(|file| {
                let input_file = InputFile::memory(file.bytes.clone()).file_name(file.file_name.clone());
                InputMedia::Photo(InputMediaPhoto::new(input_file))
            })
            .collect::<Vec<_>>();

        log::info!("Sending {} uploaded images as media group", media_group.len());
        bot.send_media_group(chat_id, media_group)
            .reply_parameters(ReplyParameters::new(message_id))
            .await?;
    }

    for file in others {
        let content_type = guess_content_type_from_file_name(&file.file_name)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        send_file_upload(
            bot,
            chat_id,
            Some(message_id),
            file.bytes.clone(),
            &content_type,
            file.file_name.clone(),
            "",
        )
        .await?;
    }

    Ok(())
}

/// 把卡片渲染为 Telegram HTML 文本
pub fn render_embed(embed: &Embed) -> String {
    let mut lines = Vec::new();

    match (&embed.title, &embed.url) {
        (Some(title), Some(url)) => lines.push(format!(
            "<b><a href=\"{}\">{}</a></b>",
            html::escape(url),
            html::escape(title)
        )),
        (Some(title), None) => lines.push(format!("<b>{}</b>", html::escape(title))),
        (None, Some(url)) => lines.push(format!(
            "<a href=\"{}\">{}</a>",
            html::escape(url),
            html::escape(url)
        )),
        (None, None) => {}
    }

    if let Some(author) = &embed.author {
        let name = html::escape(&author.name);
        lines.push(match &author.url {
            Some(url) => format!("<a href=\"{}\">{}</a>", html::escape(url), name),
            None => name,
        });
    }

    if let Some(description) = embed.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(html::escape(&substring_desc(description)));
    }

    if !embed.fields.is_empty() {
        let fields = embed
            .fields
            .iter()
            .map(|f| format!("<b>{}</b>: {}", html::escape(&f.name), html::escape(&f.value)))
            .collect::<Vec<_>>();
        lines.push(fields.join(" | "));
    }

    let footer = match (&embed.footer, embed.timestamp) {
        (Some(footer), Some(ts)) => Some(format!("{} · {}", footer.text, ts.format("%Y-%m-%d %H:%M UTC"))),
        (Some(footer), None) => Some(footer.text.clone()),
        (None, Some(ts)) => Some(ts.format("%Y-%m-%d %H:%M UTC").to_string()),
        (None, None) => None,
    };
    if let Some(footer) = footer.filter(|f| !f.is_empty()) {
        lines.push(format!("<i>{}</i>", html::escape(&footer)));
    }

    lines.join("\n")
}

/// 收到消息时已生成的原生链接预览数量
fn native_preview_count(msg: &Message) -> usize {
    // link_preview_options 只通过序列化后的字段读取
    let preview_disabled = serde_json::to_value(msg)
        .ok()
        .and_then(|v| {
            v.pointer("/link_preview_options/is_disabled")
                .and_then(serde_json::Value::as_bool)
        })
        .unwrap_or(false);
    if preview_disabled {
        return 0;
    }

    msg.entities()
        .or_else(|| msg.caption_entities())
        .map(|entities| {
            entities
                .iter()
                .filter(|e| matches!(e.kind, MessageEntityKind::Url | MessageEntityKind::TextLink { .. }))
                .count()
        })
        .unwrap_or(0)
}

/// 把 Telegram 消息转换为平台无关的入站消息
pub fn incoming_from(msg: &Message) -> Option<IncomingMessage> {
    let content = msg.text().or_else(|| msg.caption())?;

    Some(IncomingMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        thread_id: msg
            .thread_id
            .filter(|_| msg.is_topic_message)
            .map(|thread| thread.0.0),
        is_private: msg.chat.is_private(),
        content: content.to_string(),
        native_embeds: native_preview_count(msg),
    })
}

/// 回复的发送步骤
#[derive(Debug, PartialEq)]
enum DeliveryStep<'a> {
    /// 带图片的卡片合并为一组，说明文字取第一张卡片
    Photos { caption: &'a Embed, urls: Vec<String> },
    Embed(&'a Embed),
    Files(&'a [FileAttachment]),
    Text(&'a str),
}

/// 先发卡片和附件，文本最后发送
fn delivery_plan(response: &ProcessResponse) -> Vec<DeliveryStep<'_>> {
    let (visual, textual): (Vec<&Embed>, Vec<&Embed>) =
        response.embeds.iter().partition(|e| e.image_url.is_some());

    let mut steps = Vec::new();
    if let Some(first) = visual.first() {
        let urls = visual.iter().filter_map(|e| e.image_url.clone()).collect();
        steps.push(DeliveryStep::Photos {
            caption: first,
            urls,
        });
    }
    steps.extend(textual.into_iter().map(DeliveryStep::Embed));
    if !response.files.is_empty() {
        steps.push(DeliveryStep::Files(&response.files));
    }
    if let Some(text) = response.text.as_deref().filter(|t| !t.is_empty()) {
        steps.push(DeliveryStep::Text(text));
    }
    steps
}

/// 按成员状态换算权限，普通成员沿用群组默认权限
fn member_permissions(
    kind: &ChatMemberKind,
    chat_defaults: Option<ChatPermissions>,
) -> BotPermissions {
    match kind {
        ChatMemberKind::Owner { .. } => BotPermissions {
            embed_links: true,
            attach_files: true,
            manage_messages: true,
            send_in_threads: true,
        },
        ChatMemberKind::Administrator(admin) => BotPermissions {
            embed_links: true,
            attach_files: true,
            manage_messages: admin.can_delete_messages,
            send_in_threads: true,
        },
        ChatMemberKind::Restricted(restricted) => BotPermissions {
            embed_links: restricted.can_send_photos,
            attach_files: restricted.can_send_documents,
            manage_messages: false,
            send_in_threads: restricted.can_send_messages,
        },
        ChatMemberKind::Member { .. } => {
            // 频道等没有默认权限的会话不限制成员
            let defaults = chat_defaults.unwrap_or(ChatPermissions::all());
            BotPermissions {
                embed_links: defaults.contains(ChatPermissions::SEND_PHOTOS),
                attach_files: defaults.contains(ChatPermissions::SEND_DOCUMENTS),
                manage_messages: false,
                send_in_threads: defaults.contains(ChatPermissions::SEND_MESSAGES),
            }
        }
        _ => BotPermissions::default(),
    }
}

/// 基于 teloxide 的 [`ChatGateway`] 实现
pub struct TelegramGateway {
    bot: Bot,
    bot_id: UserId,
    http: reqwest::Client,
}

impl TelegramGateway {
    pub fn new(bot: Bot, bot_id: UserId) -> Result<Self> {
        Ok(Self {
            bot,
            bot_id,
            http: common::http::default_client()?,
        })
    }

    async fn send_response(
        &self,
        message: &IncomingMessage,
        response: &ProcessResponse,
    ) -> Result<()> {
        let chat_id = ChatId(message.chat_id);
        let reply_to = MessageId(message.message_id);

        if response.is_empty() {
            log::debug!("Nothing to send for message {}", message.message_id);
            return Ok(());
        }

        for step in delivery_plan(response) {
            match step {
                DeliveryStep::Photos { caption, urls } => {
                    MessageSenderBuilder::new(chat_id, render_embed(caption))
                        .message_id(reply_to)
                        .urls(urls)
                        .send_photo(&self.bot, &self.http)
                        .await?;
                }
                DeliveryStep::Embed(embed) => {
                    MessageSenderBuilder::new(chat_id, render_embed(embed))
                        .message_id(reply_to)
                        .send_message(&self.bot)
                        .await?;
                }
                DeliveryStep::Files(files) => {
                    send_attachments(&self.bot, chat_id, reply_to, files).await?;
                }
                DeliveryStep::Text(text) => {
                    send_reply_text(&self.bot, chat_id, reply_to, html::escape(text)).await?;
                }
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl ChatGateway for TelegramGateway {
    async fn permissions(&self, chat_id: i64, scope: ChatScope) -> Result<BotPermissions> {
        let member = self.bot.get_chat_member(ChatId(chat_id), self.bot_id).await?;

        let chat_defaults = if matches!(member.kind, ChatMemberKind::Member { .. }) {
            self.bot.get_chat(ChatId(chat_id)).await?.permissions()
        } else {
            None
        };

        let permissions = member_permissions(&member.kind, chat_defaults);
        log::debug!("Permissions in chat {} ({:?}): {:?}", chat_id, scope, permissions);
        Ok(permissions)
    }

    async fn send_placeholder(&self, message: &IncomingMessage, text: &str) -> Result<PostedMessage> {
        let sent = send_reply_text(
            &self.bot,
            ChatId(message.chat_id),
            MessageId(message.message_id),
            html::escape(text),
        )
        .await?;

        Ok(PostedMessage {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn delete_message(&self, posted: &PostedMessage) -> Result<()> {
        self.bot
            .delete_message(ChatId(posted.chat_id), MessageId(posted.message_id))
            .await?;
        Ok(())
    }

    async fn deliver(&self, message: &IncomingMessage, response: &ProcessResponse) -> Result<()> {
        self.send_response(message, response).await
    }

    async fn deliver_command(
        &self,
        message: &IncomingMessage,
        response: &ProcessResponse,
    ) -> Result<()> {
        self.send_response(message, response).await
    }

    async fn suppress_embeds(&self, message: &IncomingMessage) -> Result<()> {
        // Bot API 不能修改他人消息的预览
        log::debug!(
            "Embed suppression is not available for message {} in chat {}",
            message.message_id,
            message.chat_id
        );
        Ok(())
    }

    async fn reply_notice(&self, message: &IncomingMessage, text: &str) -> Result<()> {
        send_reply_text(
            &self.bot,
            ChatId(message.chat_id),
            MessageId(message.message_id),
            html::escape(text),
        )
        .await?;
        Ok(())
    }

    async fn native_embed_count(&self, message: &IncomingMessage) -> usize {
        // Bot API 无法重新获取消息，使用收到时的快照
        message.native_embeds
    }
}

/// 普通消息入口
pub async fn message_handler(msg: Message, state: BotState) -> ResponseResult<()> {
    if msg.from.as_ref().is_some_and(|user| user.is_bot) {
        return Ok(());
    }

    let Some(incoming) = incoming_from(&msg) else {
        return Ok(());
    };

    state
        .manager
        .handle_message(state.gateway.clone(), incoming)
        .await;
    Ok(())
}

// 简单的发送文本回复
pub async fn send_reply_text(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: String,
) -> ResponseResult<Message> {
    log::debug!("send_reply_text: {}\n\t{}", chat_id, text);
    bot.send_message(chat_id, text)
        .reply_parameters(ReplyParameters::new(message_id))
        .parse_mode(ParseMode::Html)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{Color, EmbedAuthor};

    #[test]
    fn test_render_full_embed() {
        let embed = Embed::new(Color(0x1083FE))
            .title("A <title>")
            .url("https://bsky.app/profile/a/post/1?x=1&y=2")
            .author(EmbedAuthor {
                name: "Alice (@alice)".to_string(),
                icon_url: None,
                url: Some("https://bsky.app/profile/alice".to_string()),
            })
            .description("hello & goodbye")
            .field("Likes", 3, true)
            .field("Reposts", 1, true)
            .footer("Bluesky", None)
            .timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).single());

        let rendered = render_embed(&embed);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines[0],
            "<b><a href=\"https://bsky.app/profile/a/post/1?x=1&amp;y=2\">A &lt;title&gt;</a></b>"
        );
        assert_eq!(lines[1], "<a href=\"https://bsky.app/profile/alice\">Alice (@alice)</a>");
        assert_eq!(lines[2], "hello &amp; goodbye");
        assert_eq!(lines[3], "<b>Likes</b>: 3 | <b>Reposts</b>: 1");
        assert_eq!(lines[4], "<i>Bluesky · 2024-05-01 12:30 UTC</i>");
    }

    #[test]
    fn test_render_minimal_embed() {
        let embed = Embed::new(Color::DEFAULT).url("https://example.com/a");
        assert_eq!(
            render_embed(&embed),
            "<a href=\"https://example.com/a\">https://example.com/a</a>"
        );
        assert_eq!(render_embed(&Embed::new(Color::DEFAULT)), "");
    }

    fn sample_file(name: &str) -> FileAttachment {
        FileAttachment {
            file_name: name.to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_text_is_sent_after_media() {
        let response = ProcessResponse {
            text: Some("https://fxbsky.app/profile/a/post/1".to_string()),
            embeds: vec![
                Embed::new(Color::DEFAULT).description("plain"),
                Embed::new(Color::DEFAULT).image("https://cdn.example/1.jpg"),
                Embed::new(Color::DEFAULT).image("https://cdn.example/2.jpg"),
            ],
            files: vec![sample_file("clip.mp4")],
        };

        let plan = delivery_plan(&response);
        assert_eq!(plan.len(), 4);
        assert!(matches!(
            &plan[0],
            DeliveryStep::Photos { urls, .. } if urls.len() == 2
        ));
        assert_eq!(plan[1], DeliveryStep::Embed(&response.embeds[0]));
        assert_eq!(plan[2], DeliveryStep::Files(&response.files));
        assert_eq!(plan[3], DeliveryStep::Text("https://fxbsky.app/profile/a/post/1"));
    }

    #[test]
    fn test_empty_text_is_skipped() {
        let response = ProcessResponse {
            text: Some(String::new()),
            ..Default::default()
        };
        assert!(delivery_plan(&response).is_empty());
    }

    fn member_kind(value: serde_json::Value) -> ChatMemberKind {
        let mut body = serde_json::json!({
            "user": {"id": 42, "is_bot": true, "first_name": "sauce", "username": "sauce_bot"}
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), value.as_object()) {
            body.extend(extra.clone());
        }
        serde_json::from_value::<teloxide::types::ChatMember>(body)
            .unwrap()
            .kind
    }

    #[test]
    fn test_plain_member_uses_chat_defaults() {
        let kind = member_kind(serde_json::json!({"status": "member"}));

        let defaults = ChatPermissions::SEND_MESSAGES | ChatPermissions::SEND_PHOTOS;
        let permissions = member_permissions(&kind, Some(defaults));
        assert!(permissions.embed_links);
        assert!(!permissions.attach_files);
        assert!(permissions.send_in_threads);
        assert!(!permissions.manage_messages);

        let unrestricted = member_permissions(&kind, None);
        assert!(unrestricted.covers(&crate::gateway::REQUIRED_THREAD_PERMISSIONS));
    }

    #[test]
    fn test_restricted_member_uses_own_flags() {
        let kind = member_kind(serde_json::json!({
            "status": "restricted",
            "is_member": true,
            "until_date": 0,
            "can_send_messages": true,
            "can_send_audios": false,
            "can_send_documents": false,
            "can_send_photos": true,
            "can_send_videos": false,
            "can_send_video_notes": false,
            "can_send_voice_notes": false,
            "can_send_polls": false,
            "can_send_other_messages": false,
            "can_add_web_page_previews": false,
            "can_change_info": false,
            "can_invite_users": false,
            "can_pin_messages": false,
            "can_manage_topics": false
        }));

        // 群组默认权限对受限成员无效
        let permissions = member_permissions(&kind, Some(ChatPermissions::all()));
        assert!(permissions.embed_links);
        assert!(!permissions.attach_files);
        assert!(!permissions.covers(&crate::gateway::REQUIRED_CHANNEL_PERMISSIONS));
    }

    #[test]
    fn test_departed_member_has_no_permissions() {
        let kind = member_kind(serde_json::json!({"status": "left"}));
        assert_eq!(member_permissions(&kind, None), BotPermissions::default());
    }

    // 需要真实 bot token 和 chat_id
    struct MockBot;

    impl MockBot {
        fn bot() -> Bot {
            dotenv::dotenv().ok();
            Bot::from_env()
        }

        fn get_chat_id() -> ChatId {
            ChatId(
                common::get_env_var("TEST_CHAT_ID")
                    .unwrap()
                    .parse()
                    .unwrap(),
            )
        }
    }

    #[tokio::test]
    #[ignore = "需要真实bot token和chat_id，仅手动测试"]
    async fn test_send_photo_group_in_chunks() {
        let bot = MockBot::bot();
        let http = common::http::default_client().unwrap();
        let urls = (0..12)
            .map(|i| format!("https://picsum.photos/seed/{}/400/300.jpg", i))
            .collect();

        let result = MessageSenderBuilder::new(MockBot::get_chat_id(), "分组图片".to_string())
            .urls(urls)
            .send_photo(&bot, &http)
            .await;

        assert!(result.is_ok());
    }
}
