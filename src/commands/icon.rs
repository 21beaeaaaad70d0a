use poise::serenity_prelude as serenity;

use crate::icons::IconSource;
use crate::{status_updater, Context, Error};

/// get the link to your current game's icon if it exists.
#[poise::command(slash_command, guild_only)]
#[tracing::instrument(skip_all)]
pub async fn get_icon(
    ctx: Context<'_>,
    #[description = "the user whose game to target (defaults to you)"] user: Option<serenity::User>,
    #[description = "the service to pick the icon from (defaults to first available)"]
    source: Option<IconSource>,
    #[description = "also upload the icon as a server emoji"] upload: Option<bool>,
) -> Result<(), Error> {
    tracing::info!(user = %ctx.author().name, "ran /get_icon");

    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let target_id = user.as_ref().map(|user| user.id).unwrap_or(ctx.author().id);

    let Some(activity) = status_updater::member_game_activity(
        &ctx.serenity_context().cache,
        ctx.data(),
        guild_id,
        target_id,
    ) else {
        ctx.send(
            poise::CreateReply::default()
                .ephemeral(true)
                .content("user is not playing any games."),
        )
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;
        return Ok(());
    };

    let Some(icon_url) = ctx.data().icons.game_image(&activity, source).await else {
        ctx.send(
            poise::CreateReply::default()
                .ephemeral(true)
                .content("unable to get a game icon for this game."),
        )
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;
        return Ok(());
    };

    let reply = if upload.unwrap_or(false) {
        match ctx
            .data()
            .icons
            .upload_game_emoji(ctx.http(), guild_id, &activity.name, &icon_url)
            .await
        {
            Ok(emoji) => format!("{icon_url}\nuploaded as {emoji}"),
            Err(e) => {
                tracing::error!(err = ?e, game = %activity.name, "an error occurred when uploading emoji");
                format!("{icon_url}\ncouldn't upload the emoji, though.")
            }
        }
    } else {
        icon_url
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
