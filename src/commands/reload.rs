use crate::{Context, Error};

/// restart the bot in case it broke.
///
/// the process only shuts the shards down; bringing it back up is the
/// process supervisor's job.
#[poise::command(slash_command, owners_only)]
#[tracing::instrument(skip_all)]
pub async fn reload(ctx: Context<'_>) -> Result<(), Error> {
    tracing::warn!(user = %ctx.author().name, "ran /reload, shutting down shards");

    ctx.send(
        poise::CreateReply::default()
            .ephemeral(true)
            .content("reloading..."),
    )
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;

    ctx.framework().shard_manager.shutdown_all().await;

    Ok(())
}
