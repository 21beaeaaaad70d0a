use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use poise::serenity_prelude::{self as serenity, *};
use tracing::Instrument;

use crate::config::{ConfigStore, DEFAULT_CONFIG_PATH};
use crate::constants::{PRESENCE_POLL_INTERVAL, STATUS_UPDATE_INTERVAL};
use crate::icons::IconIndex;
use crate::poller::PresencePoller;
use crate::roblox::RobloxFetcher;
use crate::steam::SteamFetcher;
use crate::{commands, status_updater, telemetry, Data};

fn init_config() -> Arc<Mutex<ConfigStore>> {
    let path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    tracing::info!(path = %path, "loading config...");
    Arc::new(Mutex::new(ConfigStore::load(path)))
}

fn init_steam(client: &reqwest::Client) -> Option<Arc<PresencePoller<SteamFetcher>>> {
    match std::env::var("STEAM_KEY") {
        Ok(key) if !key.is_empty() => {
            let poller = PresencePoller::new(SteamFetcher::new(client.clone(), key))
                .with_stale_timeout(Duration::from_secs(15 * 60))
                .with_batch_size(100)
                .with_max_retries(3)
                .with_base_backoff(Duration::from_secs(2));

            Some(Arc::new(poller))
        }
        _ => {
            tracing::warn!("no steam api key found. steam account lookups will be disabled.");
            None
        }
    }
}

fn init_roblox(client: &reqwest::Client) -> Arc<PresencePoller<RobloxFetcher>> {
    let poller = PresencePoller::new(RobloxFetcher::new(client.clone()))
        .with_stale_timeout(Duration::from_secs(15 * 60))
        .with_batch_size(100)
        .with_max_retries(3)
        .with_base_backoff(Duration::from_secs(2));

    Arc::new(poller)
}

async fn init_icons(client: &reqwest::Client) -> Arc<IconIndex> {
    tracing::info!("loading application indexes...");

    match IconIndex::load(client.clone()).await {
        Ok(icons) => Arc::new(icons),
        Err(e) => {
            tracing::warn!(err = ?e, "failed to load application indexes. icon lookups will be degraded.");
            Arc::new(IconIndex::empty(client.clone()))
        }
    }
}

async fn init_discord_client(token: &str, data: Data) -> anyhow::Result<Client> {
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_PRESENCES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::help::help(),
                commands::status::status(),
                commands::voice::toggle(),
                commands::voice::update(),
                commands::voice::debug(),
                commands::emoji::emoji(),
                commands::config::config(),
                commands::icon::get_icon(),
                commands::reload::reload(),
            ],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("wp>".into()),
                ..Default::default()
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands)
                    .await
                    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when registering commands"))?;

                Ok(data)
            }.in_current_span())
        })
        .build();

    let client = ClientBuilder::new(token, intents)
        .framework(framework)
        .activity(serenity::ActivityData {
            name: "who's playing what".into(),
            kind: serenity::ActivityType::Watching,
            state: None,
            url: None,
        })
        .await?;

    Ok(client)
}

fn spawn_background_tasks(client: &Client, data: &Data) {
    let cache = client.cache.clone();
    let status_data = data.clone();

    tracing::info!("initialized voice status updater!");

    tokio::spawn(
        async move {
            let interval = tokio::time::interval(STATUS_UPDATE_INTERVAL);
            let task = futures::stream::unfold(interval, |mut interval| async {
                interval.tick().await;
                let _ = status_updater::update_all(&cache, &status_data).await;

                Some(((), interval))
            });

            task.for_each(|_| async {}).await;
        }
        .in_current_span(),
    );

    if let Some(steam) = data.steam.clone() {
        tracing::info!("initialized steam presence poller!");

        tokio::spawn(
            async move {
                let interval = tokio::time::interval(PRESENCE_POLL_INTERVAL);
                let task = futures::stream::unfold(interval, |mut interval| async {
                    interval.tick().await;
                    steam.poll_with_backoff().await;

                    Some(((), interval))
                });

                task.for_each(|_| async {}).await;
            }
            .in_current_span(),
        );
    }

    let roblox = data.roblox.clone();

    tracing::info!("initialized roblox presence poller!");

    tokio::spawn(
        async move {
            let interval = tokio::time::interval(PRESENCE_POLL_INTERVAL);
            let task = futures::stream::unfold(interval, |mut interval| async {
                interval.tick().await;
                roblox.poll_with_backoff().await;

                Some(((), interval))
            });

            task.for_each(|_| async {}).await;
        }
        .in_current_span(),
    );
}

pub async fn init() -> anyhow::Result<Client> {
    tracing::info!("initializing...");

    let token = std::env::var("DISCORD_TOKEN").expect("missing DISCORD_TOKEN");

    telemetry::init_telemetry().expect("failed to initialize telemetry");

    let config = init_config();
    let reqwest_client = reqwest::Client::new();
    let steam = init_steam(&reqwest_client);
    let roblox = init_roblox(&reqwest_client);
    let icons = init_icons(&reqwest_client).await;

    let data = Data {
        config,
        steam,
        roblox,
        icons,
        reqwest_client,
        discord_token: token.clone(),
    };

    let client = init_discord_client(&token, data.clone()).await?;
    spawn_background_tasks(&client, &data);

    tracing::info!("finished initializing!");
    Ok(client)
}
