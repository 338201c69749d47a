use teloxide::utils::html;
use teloxide::{prelude::*, utils::command::BotCommands};

use crate::bot::{self, BotState, incoming_from};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum BotCommand {
    /// Reply with the embed for the given URL.
    Sauce(String),
    /// Show this help message.
    Help,
}

pub async fn bot_command_handler(
    bot: Bot,
    msg: Message,
    cmd: BotCommand,
    state: BotState,
) -> ResponseResult<()> {
    match cmd {
        BotCommand::Sauce(argument) => {
            let Some(incoming) = incoming_from(&msg) else {
                return Ok(());
            };

            log::debug!("Sauce command in chat {}: {}", msg.chat.id, argument);
            state
                .manager
                .handle_command(state.gateway.clone(), incoming, argument.trim())
                .await;
        }
        BotCommand::Help => {
            bot::send_reply_text(
                &bot,
                msg.chat.id,
                msg.id,
                html::escape(&BotCommand::descriptions().to_string()),
            )
            .await?;
        }
    };

    Ok(())
}
