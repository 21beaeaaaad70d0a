use std::sync::{Arc, Mutex};

use config::ConfigStore;
use icons::IconIndex;
use poller::PresencePoller;
use roblox::RobloxFetcher;
use steam::SteamFetcher;

#[derive(Clone)]
pub struct Data {
    pub config: Arc<Mutex<ConfigStore>>,
    pub steam: Option<Arc<PresencePoller<SteamFetcher>>>,
    pub roblox: Arc<PresencePoller<RobloxFetcher>>,
    pub icons: Arc<IconIndex>,
    pub reqwest_client: reqwest::Client,
    pub discord_token: String,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

mod commands;
mod config;
mod constants;
mod games;
mod icons;
mod init;
mod models;
mod poller;
mod roblox;
mod status_updater;
mod steam;
mod telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = &*constants::STARTUP_TIME;

    let mut client = init::init().await?;

    client.start().await?;

    Ok(())
}
