use crate::commands::current_voice_channel;
use crate::games;
use crate::{status_updater, Context, Error};

/// toggle voice status updates for this channel.
#[poise::command(slash_command, guild_only)]
#[tracing::instrument(skip_all)]
pub async fn toggle(ctx: Context<'_>) -> Result<(), Error> {
    tracing::info!(user = %ctx.author().name, "ran /toggle");

    let Some((guild_id, channel_id)) = current_voice_channel(&ctx) else {
        ctx.send(
            poise::CreateReply::default()
                .ephemeral(true)
                .content("this is not a voice channel"),
        )
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;
        return Ok(());
    };

    let message = {
        let mut store = ctx.data().config.lock().unwrap();
        let channel_config = store.channel_mut(guild_id.get(), channel_id.get());
        channel_config.active = !channel_config.active;

        let message = if channel_config.active {
            "enabled voice status updates for this channel"
        } else {
            channel_config.current_message = None;
            "disabled voice status updates for this channel"
        };

        store
            .save()
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when saving config"))?;

        message
    };

    ctx.send(
        poise::CreateReply::default()
            .ephemeral(true)
            .content(message),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    tracing::info!(channel = channel_id.get(), "{message}");

    Ok(())
}

/// force an update of the voice status for this channel.
#[poise::command(slash_command, guild_only)]
#[tracing::instrument(skip_all)]
pub async fn update(ctx: Context<'_>) -> Result<(), Error> {
    tracing::info!(user = %ctx.author().name, "ran /update");

    let Some((guild_id, channel_id)) = current_voice_channel(&ctx) else {
        ctx.send(
            poise::CreateReply::default()
                .ephemeral(true)
                .content("this is not a voice channel"),
        )
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;
        return Ok(());
    };

    {
        let mut store = ctx.data().config.lock().unwrap();
        store
            .channel_mut(guild_id.get(), channel_id.get())
            .current_message = None;
    }

    status_updater::update_guild(
        &ctx.serenity_context().cache,
        ctx.data(),
        guild_id,
        Some(channel_id),
        true,
    )
    .await?;

    ctx.send(
        poise::CreateReply::default()
            .ephemeral(true)
            .content("updated the voice status"),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    Ok(())
}

/// debug the current voice channel status.
#[poise::command(slash_command, guild_only)]
#[tracing::instrument(skip_all)]
pub async fn debug(ctx: Context<'_>) -> Result<(), Error> {
    tracing::info!(user = %ctx.author().name, "ran /debug");

    let Some((guild_id, channel_id)) = current_voice_channel(&ctx) else {
        ctx.send(
            poise::CreateReply::default()
                .ephemeral(true)
                .content("this is not a voice channel"),
        )
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;
        return Ok(());
    };

    let Some(channel) =
        status_updater::snapshot_voice_channels(&ctx.serenity_context().cache, guild_id)
            .into_iter()
            .find(|channel| channel.id == channel_id)
    else {
        ctx.send(
            poise::CreateReply::default()
                .ephemeral(true)
                .content("this is not a voice channel"),
        )
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;
        return Ok(());
    };

    let (tallies, channel_config) = {
        let mut store = ctx.data().config.lock().unwrap();
        let guild_config = store.guild_mut(guild_id.get());

        let all_games = status_updater::channel_games(ctx.data(), guild_config, &channel);
        let tallies = games::tally_games(&all_games, &guild_config.emojis);
        let channel_config = guild_config
            .channels
            .entry(channel_id.get())
            .or_default()
            .clone();

        (tallies, channel_config)
    };

    let activities: Vec<(String, String)> = channel
        .members
        .iter()
        .flat_map(|member| {
            member
                .activities
                .iter()
                .map(|activity| (member.name.clone(), activity.clone()))
        })
        .collect();
    let tracked: Vec<(String, u32)> = tallies
        .iter()
        .map(|tally| (tally.name.clone(), tally.count))
        .collect();

    let message = format!(
        "all activities: {activities:?}\ntracked games: {tracked:?}\nconfig: {channel_config:?}"
    );
    tracing::debug!("{message}");

    ctx.send(
        poise::CreateReply::default()
            .ephemeral(true)
            .content(message),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    Ok(())
}
