use std::time::UNIX_EPOCH;

use poise::serenity_prelude as serenity;

use crate::commands::get_bot_avatar;
use crate::constants::{version::get_version, POISE_VERSION, STARTUP_TIME};
use crate::{Context, Error};

/// get the bot's status.
#[poise::command(prefix_command)]
#[tracing::instrument(skip_all)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let tracked = ctx.data().config.lock().unwrap().tracked_channel_count();

    ctx.send(poise::CreateReply::default().embed(
        serenity::CreateEmbed::new()
        .field(
            "about the bot",
            "whosplaying watches voice channels and writes what everyone is playing into the channel status, using the [poise](https://github.com/serenity-rs/poise) framework.".to_string(),
            false
        )
        .field("version", get_version(), false)
        .field("rust", format!("[{0}](https://releases.rs/docs/{0})", rustc_version_runtime::version()), true)
        .field("poise", format!("[{0}](https://docs.rs/crate/poise/{0})", POISE_VERSION), true)
        .field("channels tracked", format!("{}", tracked), true)
        .field("uptime", format!("<t:{}:R>", STARTUP_TIME.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()), true)
        .thumbnail(get_bot_avatar(ctx))
    ))
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    Ok(())
}
