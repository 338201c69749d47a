use std::sync::Arc;

use common::{CacheManager, GlobalDefaults, SiteAdapter};
use dotenv::dotenv;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use processor_artstation::ArtStationAdapter;
use processor_bluesky::BlueskyAdapter;
use processor_furaffinity::FurAffinityAdapter;
use processor_misskey::MisskeyAdapter;
use processor_pixiv::PixivAdapter;
use processor_x::XAdapter;

mod bot;
mod commands;
mod config;
mod gateway;
mod site_manager;

use bot::{BotState, TelegramGateway};
use commands::BotCommand;
use config::{ChannelConfigProvider, JsonFileConfigProvider};
use gateway::ChatGateway;
use site_manager::{SiteManager, SiteRegistry};

fn boxed<A: SiteAdapter + 'static>(adapter: A) -> Box<dyn SiteAdapter> {
    Box::new(adapter)
}

/// 固定顺序的适配器列表，构建失败的站点记录后跳过
fn init_adapters(cache: &CacheManager, defaults: &GlobalDefaults) -> Vec<Box<dyn SiteAdapter>> {
    let candidates: Vec<(&str, anyhow::Result<Box<dyn SiteAdapter>>)> = vec![
        ("Twitter", Ok(boxed(XAdapter))),
        ("Bluesky", BlueskyAdapter::new(cache.clone()).map(boxed)),
        (
            "Pixiv",
            PixivAdapter::new(cache.clone(), defaults.maximum_pixiv_images).map(boxed),
        ),
        ("Misskey", MisskeyAdapter::new(cache.clone()).map(boxed)),
        ("ArtStation", ArtStationAdapter::new(cache.clone()).map(boxed)),
        ("FurAffinity", FurAffinityAdapter::new(cache.clone()).map(boxed)),
    ];

    candidates
        .into_iter()
        .filter_map(|(name, adapter)| match adapter {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                log::error!("Failed to start site {}: {}", name, e);
                None
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cache = CacheManager::from_env();
    let defaults = GlobalDefaults::from_env();
    let disabled = config::disabled_sites_from_env();
    let configs: Arc<dyn ChannelConfigProvider> = Arc::new(JsonFileConfigProvider::from_env()?);

    let registry = SiteRegistry::new(init_adapters(&cache, &defaults), &disabled);
    if registry.is_empty() {
        log::warn!("No sites enabled, links will not be processed");
    } else {
        log::info!(
            "Enabled {} sites: {}",
            registry.len(),
            registry.identifiers().join(", ")
        );
    }
    let manager = Arc::new(SiteManager::new(registry, configs, defaults));

    let bot = Bot::from_env();
    let me = bot.get_me().await?;
    if let Err(e) = bot.set_my_commands(BotCommand::bot_commands()).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let gateway: Arc<dyn ChatGateway> = Arc::new(TelegramGateway::new(bot.clone(), me.id)?);
    let state = BotState { manager, gateway };

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<BotCommand>()
                .endpoint(commands::bot_command_handler),
        )
        .branch(Update::filter_message().endpoint(bot::message_handler));

    log::info!("Bot @{} started. Listening for messages...", me.username());

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        // 不按会话串行分发，同一会话的消息并发处理
        .distribution_function(|_| None::<std::convert::Infallible>)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
