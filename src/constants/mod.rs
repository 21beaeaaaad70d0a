use std::sync::LazyLock;
use std::time::Duration;

pub mod discord;
pub mod roblox;
pub mod steam;
pub mod version;

pub static POISE_VERSION: &str = "0.6.1";
pub static STARTUP_TIME: LazyLock<std::time::SystemTime> =
    LazyLock::new(std::time::SystemTime::now);

/// How often every guild's voice channels get a status pass.
pub const STATUS_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// How often the external presence pollers run.
pub const PRESENCE_POLL_INTERVAL: Duration = Duration::from_secs(60);
