use std::collections::HashSet;

use poise::serenity_prelude as serenity;

use crate::{Context, Error};

#[derive(Clone, Copy, Debug, poise::ChoiceParameter)]
pub enum ConfigKey {
    #[name = "steam_id"]
    SteamId,
    #[name = "roblox_id"]
    RobloxId,
}

/// link or unlink an external account id for a member.
#[poise::command(slash_command, guild_only)]
#[tracing::instrument(skip_all)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "the key to edit"] key: ConfigKey,
    #[description = "the value to set, leave out to clear"] value: Option<String>,
    #[description = "the user to target (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    tracing::info!(user = %ctx.author().name, "ran /config");

    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let (target_id, target_name) = user
        .as_ref()
        .map(|user| (user.id, user.name.clone()))
        .unwrap_or_else(|| (ctx.author().id, ctx.author().name.clone()));

    let live_channels: HashSet<u64> = ctx
        .guild()
        .map(|guild| {
            guild
                .channels
                .values()
                .filter(|channel| channel.kind == serenity::ChannelType::Voice)
                .map(|channel| channel.id.get())
                .collect()
        })
        .unwrap_or_default();

    let reply = {
        let mut store = ctx.data().config.lock().unwrap();
        let member = store.member_mut(guild_id.get(), target_id.get());

        let key_name = match key {
            ConfigKey::SteamId => {
                member.steam_id = value.clone();
                "steam_id"
            }
            ConfigKey::RobloxId => {
                member.roblox_id = value.clone();
                "roblox_id"
            }
        };

        store.prune(guild_id.get(), &live_channels);
        store
            .save()
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when saving config"))?;

        format!(
            "set {key_name} to {} for {target_name}",
            value.as_deref().unwrap_or("nothing")
        )
    };

    ctx.send(
        poise::CreateReply::default()
            .ephemeral(true)
            .content(reply),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    Ok(())
}
