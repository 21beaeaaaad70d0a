use poise::serenity_prelude as serenity;

use crate::{status_updater, Context, Error};

#[derive(Clone, Copy, Debug, poise::ChoiceParameter)]
pub enum EmojiAction {
    #[name = "add"]
    Add,
    #[name = "remove"]
    Remove,
    #[name = "ignore"]
    Ignore,
}

/// edit the override for a game, usually to add an emoji.
///
/// the game is whatever the target member is playing right now, so there is
/// no need to spell out game titles.
#[poise::command(slash_command, guild_only)]
#[tracing::instrument(skip_all)]
pub async fn emoji(
    ctx: Context<'_>,
    #[description = "whether to add or remove an emoji, or toggle ignoring the game"]
    action: EmojiAction,
    #[description = "the emoji to add (ignored when removing)"] emoji: Option<String>,
    #[description = "override the game name with a custom display name"] display_name: Option<
        String,
    >,
    #[description = "the user whose game to target (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    tracing::info!(user = %ctx.author().name, "ran /emoji");

    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let target_id = user.as_ref().map(|user| user.id).unwrap_or(ctx.author().id);
    let games = status_updater::member_tracked_games(
        &ctx.serenity_context().cache,
        ctx.data(),
        guild_id,
        target_id,
    );

    let game = match games.as_slice() {
        [] => {
            ctx.send(
                poise::CreateReply::default()
                    .ephemeral(true)
                    .content("you are not playing any games."),
            )
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;
            return Ok(());
        }
        [game] => game.clone(),
        _ => {
            ctx.send(
                poise::CreateReply::default()
                    .ephemeral(true)
                    .content("you are playing multiple games. aborting..."),
            )
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when sending reply"))?;
            return Ok(());
        }
    };

    let reply = {
        let mut store = ctx.data().config.lock().unwrap();
        let guild_config = store.guild_mut(guild_id.get());

        let reply = match action {
            EmojiAction::Remove => match guild_config.emojis.get_mut(&game) {
                Some(config) if config.emoji.is_some() => {
                    let removed = config.emoji.take().unwrap_or_default();
                    tracing::info!(game = %game, emoji = %removed, "removed emoji");
                    format!("removed emoji {removed} for game {game}")
                }
                _ => format!("you have not added an emoji for this game. {game}"),
            },

            EmojiAction::Add => {
                let emoji = emoji
                    .as_deref()
                    .map(str::trim)
                    .filter(|emoji| !emoji.is_empty() && !emoji.contains(' '))
                    .map(String::from);

                if emoji.is_none() && display_name.is_none() {
                    format!("invalid input ({emoji:?}, {display_name:?})")
                } else {
                    let config = guild_config.emojis.entry(game.clone()).or_default();
                    if let Some(emoji) = &emoji {
                        config.emoji = Some(emoji.clone());
                    }
                    if let Some(display_name) = &display_name {
                        config.display_name = Some(display_name.clone());
                    }

                    tracing::info!(game = %game, emoji = ?emoji, display_name = ?display_name, "added emoji override");
                    format!(
                        "added emoji {} for game {game}",
                        emoji.unwrap_or_default()
                    )
                }
            }

            EmojiAction::Ignore => {
                let config = guild_config.emojis.entry(game.clone()).or_default();
                config.ignore = !config.ignore;
                tracing::info!(game = %game, ignore = config.ignore, "toggled ignore");

                if config.ignore {
                    format!("ignored game {game}")
                } else {
                    format!("unignored game {game}")
                }
            }
        };

        store
            .save()
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when saving config"))?;

        reply
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
