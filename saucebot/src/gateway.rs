//! 聊天平台接口
//!
//! 编排器只通过 [`ChatGateway`] 与平台交互，Telegram 的实现见 `bot.rs`。

use common::ProcessResponse;

/// 权限查询范围，频道与话题使用不同的查询方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatScope {
    Channel,
    Thread,
}

/// 机器人在某个频道内的能力
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BotPermissions {
    pub embed_links: bool,
    pub attach_files: bool,
    pub manage_messages: bool,
    pub send_in_threads: bool,
}

pub const REQUIRED_CHANNEL_PERMISSIONS: BotPermissions = BotPermissions {
    embed_links: true,
    attach_files: true,
    manage_messages: false,
    send_in_threads: false,
};

pub const REQUIRED_THREAD_PERMISSIONS: BotPermissions = BotPermissions {
    embed_links: true,
    attach_files: true,
    manage_messages: false,
    send_in_threads: true,
};

/// 私聊不查询权限
pub const PRIVATE_CHAT_PERMISSIONS: BotPermissions = BotPermissions {
    embed_links: true,
    attach_files: true,
    manage_messages: false,
    send_in_threads: true,
};

impl BotPermissions {
    pub fn required_for(scope: ChatScope) -> Self {
        match scope {
            ChatScope::Channel => REQUIRED_CHANNEL_PERMISSIONS,
            ChatScope::Thread => REQUIRED_THREAD_PERMISSIONS,
        }
    }

    /// 是否具备 `required` 中的全部能力
    pub fn covers(&self, required: &BotPermissions) -> bool {
        (!required.embed_links || self.embed_links)
            && (!required.attach_files || self.attach_files)
            && (!required.manage_messages || self.manage_messages)
            && (!required.send_in_threads || self.send_in_threads)
    }
}

/// 触发处理的入站消息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub thread_id: Option<i32>,
    pub is_private: bool,
    pub content: String,
    /// 收到消息时平台已生成的原生预览数量
    pub native_embeds: usize,
}

impl IncomingMessage {
    pub fn scope(&self) -> ChatScope {
        if self.thread_id.is_some() {
            ChatScope::Thread
        } else {
            ChatScope::Channel
        }
    }
}

/// 机器人发出的消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostedMessage {
    pub chat_id: i64,
    pub message_id: i32,
}

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn permissions(&self, chat_id: i64, scope: ChatScope) -> anyhow::Result<BotPermissions>;

    /// 回复一条临时的占位消息
    async fn send_placeholder(
        &self,
        message: &IncomingMessage,
        text: &str,
    ) -> anyhow::Result<PostedMessage>;

    async fn delete_message(&self, posted: &PostedMessage) -> anyhow::Result<()>;

    /// 消息路径的投递
    async fn deliver(
        &self,
        message: &IncomingMessage,
        response: &ProcessResponse,
    ) -> anyhow::Result<()>;

    /// 命令路径的投递
    async fn deliver_command(
        &self,
        message: &IncomingMessage,
        response: &ProcessResponse,
    ) -> anyhow::Result<()>;

    /// 隐藏源消息的原生预览
    async fn suppress_embeds(&self, message: &IncomingMessage) -> anyhow::Result<()>;

    /// 命令路径的终止提示
    async fn reply_notice(&self, message: &IncomingMessage, text: &str) -> anyhow::Result<()>;

    /// 重新检查源消息当前的原生预览数量
    async fn native_embed_count(&self, message: &IncomingMessage) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_sets() {
        let channel_only = BotPermissions {
            embed_links: true,
            attach_files: true,
            ..Default::default()
        };
        assert!(channel_only.covers(&BotPermissions::required_for(ChatScope::Channel)));
        assert!(!channel_only.covers(&BotPermissions::required_for(ChatScope::Thread)));

        let no_files = BotPermissions {
            embed_links: true,
            ..Default::default()
        };
        assert!(!no_files.covers(&REQUIRED_CHANNEL_PERMISSIONS));
        assert!(PRIVATE_CHAT_PERMISSIONS.covers(&REQUIRED_THREAD_PERMISSIONS));
    }

    #[test]
    fn test_scope_follows_thread() {
        let mut message = IncomingMessage::default();
        assert_eq!(message.scope(), ChatScope::Channel);
        message.thread_id = Some(3);
        assert_eq!(message.scope(), ChatScope::Thread);
    }
}
