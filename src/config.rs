use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub static DEFAULT_CONFIG_PATH: &str = "config.json";

fn default_true() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !value
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub guilds: HashMap<u64, GuildConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GuildConfig {
    #[serde(default)]
    pub channels: HashMap<u64, ChannelConfig>,
    #[serde(default)]
    pub emojis: HashMap<String, EmojiOverride>,
    #[serde(default)]
    pub members: HashMap<u64, MemberConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub current_message: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            active: true,
            name: None,
            current_message: None,
        }
    }
}

/// Per-game overrides applied while tallying. A game with every field unset
/// is considered empty and gets pruned.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EmojiOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore: bool,
}

impl EmojiOverride {
    pub fn is_empty(&self) -> bool {
        self.emoji.is_none() && self.display_name.is_none() && !self.ignore
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemberConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roblox_id: Option<String>,
}

impl MemberConfig {
    pub fn is_empty(&self) -> bool {
        self.steam_id.is_none() && self.roblox_id.is_none()
    }
}

/// The bot's configuration, edited through commands and stored to disk.
pub struct ConfigStore {
    path: PathBuf,
    data: ConfigFile,
}

impl ConfigStore {
    /// Loads the config from disk. A missing or unreadable file starts a
    /// fresh config and writes it back immediately.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let (data, fresh) = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(data) => (data, false),
                Err(e) => {
                    tracing::warn!(err = ?e, path = %path.display(), "config file did not parse, starting fresh");
                    (ConfigFile::default(), true)
                }
            },
            Err(e) => {
                tracing::warn!(err = ?e, path = %path.display(), "config file not readable, starting fresh");
                (ConfigFile::default(), true)
            }
        };

        let store = Self { path, data };

        if fresh {
            if let Err(e) = store.save() {
                tracing::error!(err = ?e, "an error occurred when writing the initial config");
            }
        }

        store
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    pub fn guild(&self, guild: u64) -> Option<&GuildConfig> {
        self.data.guilds.get(&guild)
    }

    pub fn guild_mut(&mut self, guild: u64) -> &mut GuildConfig {
        self.data.guilds.entry(guild).or_default()
    }

    pub fn channel_mut(&mut self, guild: u64, channel: u64) -> &mut ChannelConfig {
        self.guild_mut(guild).channels.entry(channel).or_default()
    }

    pub fn member_mut(&mut self, guild: u64, member: u64) -> &mut MemberConfig {
        self.guild_mut(guild).members.entry(member).or_default()
    }

    /// Number of voice channels with status updates enabled, across guilds.
    pub fn tracked_channel_count(&self) -> usize {
        self.data
            .guilds
            .values()
            .flat_map(|guild| guild.channels.values())
            .filter(|channel| channel.active)
            .count()
    }

    /// Removes config entries that no longer carry information: channels
    /// that don't exist anymore, members with no linked accounts, and game
    /// overrides with every field unset. Returns whether anything was
    /// removed.
    pub fn prune(&mut self, guild: u64, live_channels: &HashSet<u64>) -> bool {
        let Some(guild_config) = self.data.guilds.get_mut(&guild) else {
            return false;
        };

        let channels_before = guild_config.channels.len();
        guild_config.channels.retain(|id, _| {
            let keep = live_channels.contains(id);
            if !keep {
                tracing::info!(channel = *id, "removing config for voice channel that no longer exists");
            }
            keep
        });

        let members_before = guild_config.members.len();
        guild_config.members.retain(|_, member| !member.is_empty());

        let emojis_before = guild_config.emojis.len();
        guild_config.emojis.retain(|_, emoji| !emoji.is_empty());

        channels_before != guild_config.channels.len()
            || members_before != guild_config.members.len()
            || emojis_before != guild_config.emojis.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::load(dir.path().join("config.json"))
    }

    #[test]
    fn missing_file_starts_fresh_and_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.guild(1).is_none());
        assert!(dir.path().join("config.json").exists());
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{not json").unwrap();

        let store = store_in(&dir);
        assert!(store.guild(1).is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();

        {
            let mut store = store_in(&dir);
            store.channel_mut(10, 20).current_message = Some("🎮 Factorio".into());
            store.member_mut(10, 30).steam_id = Some("76561198000000000".into());
            store.guild_mut(10).emojis.insert(
                "Factorio".into(),
                EmojiOverride {
                    emoji: Some("🏭".into()),
                    ..Default::default()
                },
            );
            store.save().unwrap();
        }

        let store = store_in(&dir);
        let guild = store.guild(10).unwrap();
        assert_eq!(
            guild.channels[&20].current_message.as_deref(),
            Some("🎮 Factorio")
        );
        assert_eq!(
            guild.members[&30].steam_id.as_deref(),
            Some("76561198000000000")
        );
        assert_eq!(guild.emojis["Factorio"].emoji.as_deref(), Some("🏭"));
    }

    #[test]
    fn numeric_keys_become_json_strings() {
        let mut file = ConfigFile::default();
        file.guilds.entry(42).or_default();

        let raw = serde_json::to_string(&file).unwrap();
        assert!(raw.contains("\"42\""));

        let back: ConfigFile = serde_json::from_str(&raw).unwrap();
        assert!(back.guilds.contains_key(&42));
    }

    #[test]
    fn new_channels_default_to_active() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        assert!(store.channel_mut(1, 2).active);

        let partial: ChannelConfig = serde_json::from_str("{}").unwrap();
        assert!(partial.active);
    }

    #[test]
    fn prune_drops_dead_channels_and_empty_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        store.channel_mut(1, 100).active = false;
        store.channel_mut(1, 200);
        store.member_mut(1, 5);
        store.member_mut(1, 6).steam_id = Some("7656".into());
        store
            .guild_mut(1)
            .emojis
            .insert("Dead Game".into(), EmojiOverride::default());
        store.guild_mut(1).emojis.insert(
            "Live Game".into(),
            EmojiOverride {
                ignore: true,
                ..Default::default()
            },
        );

        let live = HashSet::from([100]);
        assert!(store.prune(1, &live));

        let guild = store.guild(1).unwrap();
        assert!(guild.channels.contains_key(&100));
        assert!(!guild.channels.contains_key(&200));
        assert!(!guild.members.contains_key(&5));
        assert!(guild.members.contains_key(&6));
        assert!(!guild.emojis.contains_key("Dead Game"));
        assert!(guild.emojis.contains_key("Live Game"));
    }

    #[test]
    fn prune_without_changes_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        store.channel_mut(1, 100);
        let live = HashSet::from([100]);

        assert!(!store.prune(1, &live));
        assert!(!store.prune(99, &live));
    }

    #[test]
    fn tracked_channel_count_only_counts_active() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        store.channel_mut(1, 100);
        store.channel_mut(1, 200).active = false;
        store.channel_mut(2, 300);

        assert_eq!(store.tracked_channel_count(), 2);
    }
}
