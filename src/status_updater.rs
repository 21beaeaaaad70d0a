use std::collections::HashSet;

use poise::serenity_prelude::{
    self as serenity, ActivityType, ChannelId, ChannelType, GuildId, UserId,
};

use crate::config::{GuildConfig, MemberConfig};
use crate::constants::discord::API_BASE;
use crate::games;
use crate::icons::GameActivity;
use crate::{Data, Error};

pub(crate) struct ChannelSnapshot {
    pub id: ChannelId,
    pub name: String,
    pub members: Vec<MemberSnapshot>,
}

pub(crate) struct MemberSnapshot {
    pub user_id: UserId,
    pub name: String,
    /// Names of game activities only.
    pub games: Vec<String>,
    /// Names of every activity, for the debug command.
    pub activities: Vec<String>,
}

fn is_game(activity: &serenity::Activity) -> bool {
    matches!(
        activity.kind,
        ActivityType::Playing | ActivityType::Streaming
    ) && !activity.name.is_empty()
}

/// Copies everything a status pass needs out of the gateway cache, so no
/// cache reference is held across an await.
pub(crate) fn snapshot_voice_channels(
    cache: &serenity::Cache,
    guild_id: GuildId,
) -> Vec<ChannelSnapshot> {
    let Some(guild) = cache.guild(guild_id) else {
        return Vec::new();
    };

    let mut channels: Vec<ChannelSnapshot> = guild
        .channels
        .values()
        .filter(|channel| channel.kind == ChannelType::Voice)
        .map(|channel| ChannelSnapshot {
            id: channel.id,
            name: channel.name.clone(),
            members: Vec::new(),
        })
        .collect();

    for voice in guild.voice_states.values() {
        let Some(channel_id) = voice.channel_id else {
            continue;
        };
        let Some(channel) = channels.iter_mut().find(|channel| channel.id == channel_id) else {
            continue;
        };

        let user_id = voice.user_id;
        let name = guild
            .members
            .get(&user_id)
            .map(|member| member.user.name.clone())
            .unwrap_or_else(|| user_id.to_string());

        let (games, activities) = guild
            .presences
            .get(&user_id)
            .map(|presence| {
                let games = presence
                    .activities
                    .iter()
                    .filter(|activity| is_game(activity))
                    .map(|activity| activity.name.clone())
                    .collect();
                let activities = presence
                    .activities
                    .iter()
                    .map(|activity| activity.name.clone())
                    .collect();
                (games, activities)
            })
            .unwrap_or_default();

        channel.members.push(MemberSnapshot {
            user_id,
            name,
            games,
            activities,
        });
    }

    channels
}

/// A member's current games: rich presence first, linked accounts as the
/// fallback.
fn tracked_games(data: &Data, member_config: Option<&MemberConfig>, member: &MemberSnapshot) -> Vec<String> {
    if !member.games.is_empty() {
        return member.games.clone();
    }

    linked_games(data, member_config)
}

fn linked_games(data: &Data, member_config: Option<&MemberConfig>) -> Vec<String> {
    let Some(member_config) = member_config else {
        return Vec::new();
    };

    if let (Some(steam), Some(steam_id)) = (&data.steam, &member_config.steam_id) {
        if let Some(games) = steam.games_for(steam_id) {
            if !games.is_empty() {
                return games;
            }
        }
    }

    if let Some(roblox_id) = &member_config.roblox_id {
        if let Some(games) = data.roblox.games_for(roblox_id) {
            if !games.is_empty() {
                return games;
            }
        }
    }

    Vec::new()
}

/// Every game played in a channel, one entry per playing member.
pub(crate) fn channel_games(
    data: &Data,
    guild_config: &GuildConfig,
    channel: &ChannelSnapshot,
) -> Vec<String> {
    channel
        .members
        .iter()
        .flat_map(|member| {
            tracked_games(data, guild_config.members.get(&member.user_id.get()), member)
        })
        .collect()
}

/// The games a single member is playing right now, by user id. Used by the
/// commands that target "your current game".
pub(crate) fn member_tracked_games(
    cache: &serenity::Cache,
    data: &Data,
    guild_id: GuildId,
    user_id: UserId,
) -> Vec<String> {
    let discord_games: Vec<String> = cache
        .guild(guild_id)
        .and_then(|guild| {
            guild.presences.get(&user_id).map(|presence| {
                presence
                    .activities
                    .iter()
                    .filter(|activity| is_game(activity))
                    .map(|activity| activity.name.clone())
                    .collect()
            })
        })
        .unwrap_or_default();

    if !discord_games.is_empty() {
        return discord_games;
    }

    let member_config = {
        let store = data.config.lock().unwrap();
        store
            .guild(guild_id.get())
            .and_then(|guild| guild.members.get(&user_id.get()))
            .cloned()
    };

    linked_games(data, member_config.as_ref())
}

/// Like [`member_tracked_games`], but keeps the activity's asset data for
/// the icon lookup. Linked-account games carry a name only.
pub(crate) fn member_game_activity(
    cache: &serenity::Cache,
    data: &Data,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<GameActivity> {
    let from_presence = cache.guild(guild_id).and_then(|guild| {
        guild.presences.get(&user_id).and_then(|presence| {
            presence
                .activities
                .iter()
                .find(|activity| is_game(activity))
                .map(GameActivity::from_activity)
        })
    });

    if from_presence.is_some() {
        return from_presence;
    }

    let member_config = {
        let store = data.config.lock().unwrap();
        store
            .guild(guild_id.get())
            .and_then(|guild| guild.members.get(&user_id.get()))
            .cloned()
    };

    linked_games(data, member_config.as_ref())
        .into_iter()
        .next()
        .map(GameActivity::named)
}

#[tracing::instrument(skip_all)]
pub async fn update_all(cache: &serenity::Cache, data: &Data) -> Result<(), Error> {
    for guild_id in cache.guilds() {
        if let Err(e) = update_guild(cache, data, guild_id, None, false).await {
            tracing::error!(err = ?e, guild = guild_id.get(), "an error occurred when updating guild");
        }
    }

    Ok(())
}

/// One status pass over a guild's voice channels, or over a single channel
/// when a command forces it.
pub async fn update_guild(
    cache: &serenity::Cache,
    data: &Data,
    guild_id: GuildId,
    only_channel: Option<ChannelId>,
    force: bool,
) -> Result<(), Error> {
    let channels = snapshot_voice_channels(cache, guild_id);
    let live: HashSet<u64> = channels.iter().map(|channel| channel.id.get()).collect();
    let mut config_changed = false;

    for channel in channels
        .iter()
        .filter(|channel| only_channel.is_none_or(|id| channel.id == id))
    {
        let (message, channel_is_empty) = {
            let mut store = data.config.lock().unwrap();
            let guild_config = store.guild_mut(guild_id.get());

            {
                let channel_config = guild_config.channels.entry(channel.id.get()).or_default();
                channel_config.name = Some(channel.name.clone());

                if !channel_config.active && !force {
                    // a disabled channel shouldn't keep its ids polling
                    if let Some(steam) = &data.steam {
                        steam.remove_channel(channel.id);
                    }
                    data.roblox.remove_channel(channel.id);
                    continue;
                }
            }

            // keep the pollers pointed at whoever is in the channel
            let mut steam_ids = Vec::new();
            let mut roblox_ids = Vec::new();
            for member in &channel.members {
                if let Some(member_config) = guild_config.members.get(&member.user_id.get()) {
                    if let Some(id) = &member_config.steam_id {
                        steam_ids.push(id.clone());
                    }
                    if let Some(id) = &member_config.roblox_id {
                        roblox_ids.push(id.clone());
                    }
                }
            }
            if let Some(steam) = &data.steam {
                steam.set_poll(channel.id, steam_ids);
            }
            data.roblox.set_poll(channel.id, roblox_ids);

            let all_games = channel_games(data, guild_config, channel);
            let tallies = games::tally_games(&all_games, &guild_config.emojis);
            let message = games::compose_status(&tallies);

            let channel_config = guild_config.channels.entry(channel.id.get()).or_default();
            if channel_config.current_message.as_deref() == Some(message.as_str()) {
                continue;
            }
            channel_config.current_message = Some(message.clone());
            config_changed = true;

            if !tallies.is_empty() {
                let counts: Vec<(&str, u32)> = tallies
                    .iter()
                    .map(|tally| (tally.name.as_str(), tally.count))
                    .collect();
                tracing::info!(channel = %channel.name, tallies = ?counts, "tallied games");
            }

            (message, channel.members.is_empty())
        };

        if channel_is_empty {
            // nobody there to see it, the cached message is enough
            tracing::info!(channel = %channel.name, message = %message, "setting cached status");
            continue;
        }

        tracing::info!(channel = %channel.name, message = %message, "setting voice channel status");
        if let Err(e) = set_voice_status(data, channel.id, &message).await {
            tracing::error!(err = ?e, channel = %channel.name, "an error occurred when updating voice channel status");
        }
    }

    if config_changed {
        let mut store = data.config.lock().unwrap();
        store.prune(guild_id.get(), &live);
        store
            .save()
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when saving config"))?;
    }

    Ok(())
}

/// Writes the status string through the raw REST endpoint; serenity has no
/// builder for it.
pub(crate) async fn set_voice_status(
    data: &Data,
    channel_id: ChannelId,
    status: &str,
) -> Result<(), Error> {
    let url = format!("{}/channels/{}/voice-status", API_BASE, channel_id);

    let resp = data
        .reqwest_client
        .put(url)
        .header(
            reqwest::header::AUTHORIZATION,
            format!("Bot {}", data.discord_token),
        )
        .json(&serde_json::json!({ "status": status }))
        .send()
        .await?;

    let code = resp.status();
    if code != reqwest::StatusCode::NO_CONTENT {
        let body = resp.text().await.unwrap_or_default();
        tracing::error!(
            channel = channel_id.get(),
            status = %code,
            body = %body,
            "failed to update voice channel status"
        );
    }

    Ok(())
}
