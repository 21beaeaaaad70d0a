use poise::serenity_prelude as serenity;

use crate::Context;

pub mod config;
pub mod emoji;
pub mod help;
pub mod icon;
pub mod reload;
pub mod status;
pub mod voice;

pub(crate) fn get_bot_avatar(ctx: Context<'_>) -> String {
    ctx.cache().current_user().avatar_url().unwrap_or_default()
}

/// The guild and channel of the invocation, when it happened in a voice
/// channel.
pub(crate) fn current_voice_channel(
    ctx: &Context<'_>,
) -> Option<(serenity::GuildId, serenity::ChannelId)> {
    let guild = ctx.guild()?;
    let channel = guild.channels.get(&ctx.channel_id())?;

    (channel.kind == serenity::ChannelType::Voice).then_some((guild.id, channel.id))
}
