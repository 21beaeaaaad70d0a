use poise::serenity_prelude as serenity;

use crate::constants::discord::{API_BASE, CDN_BASE, MEDIA_PROXY_BASE};
use crate::constants::steam::{APP_LIST_ENDPOINT, STORE_CDN_BASE};
use crate::models::discord::{DetectableApplication, RpcApplication};
use crate::models::steam::{AppListResponse, SteamApp};
use crate::Error;

/// Which service to pick a game icon from. Unset means first available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, poise::ChoiceParameter)]
pub enum IconSource {
    #[name = "discord"]
    Discord,
    #[name = "steam"]
    Steam,
}

/// What the icon lookup needs to know about a game someone is playing.
/// Built from a rich-presence activity, or from just a name when the game
/// came out of a linked account.
#[derive(Clone, Debug, Default)]
pub struct GameActivity {
    pub name: String,
    pub application_id: Option<u64>,
    pub large_image: Option<String>,
    pub small_image: Option<String>,
}

impl GameActivity {
    pub fn from_activity(activity: &serenity::Activity) -> Self {
        Self {
            name: activity.name.clone(),
            application_id: activity.application_id.map(|id| id.get()),
            large_image: activity
                .assets
                .as_ref()
                .and_then(|assets| assets.large_image.clone()),
            small_image: activity
                .assets
                .as_ref()
                .and_then(|assets| assets.small_image.clone()),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// The application indexes used to find a representative image for a game,
/// loaded once at startup.
pub struct IconIndex {
    client: reqwest::Client,
    apps: Vec<DetectableApplication>,
    steam_apps: Vec<SteamApp>,
}

impl IconIndex {
    pub fn empty(client: reqwest::Client) -> Self {
        Self {
            client,
            apps: Vec::new(),
            steam_apps: Vec::new(),
        }
    }

    pub async fn load(client: reqwest::Client) -> anyhow::Result<Self> {
        tracing::debug!("loading discord detectable applications");
        let apps: Vec<DetectableApplication> = client
            .get(format!("{}/applications/detectable", API_BASE))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!(count = apps.len(), "loaded discord detectable applications");

        tracing::debug!("loading steam app list");
        let steam: AppListResponse = client
            .get(APP_LIST_ENDPOINT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!(count = steam.applist.apps.len(), "loaded steam app list");

        Ok(Self {
            client,
            apps,
            steam_apps: steam.applist.apps,
        })
    }

    /// Resolves an image URL for a game, trying the activity's own assets,
    /// then Discord's detectable application index, then the Steam store
    /// CDN.
    pub async fn game_image(
        &self,
        activity: &GameActivity,
        source: Option<IconSource>,
    ) -> Option<String> {
        let from_discord = source.is_none_or(|s| s == IconSource::Discord);
        let from_steam = source.is_none_or(|s| s == IconSource::Steam);

        if from_discord {
            if let Some(url) = activity
                .large_image
                .as_deref()
                .and_then(|key| asset_url(activity.application_id, key))
            {
                return Some(url);
            }

            if let Some(url) = activity
                .small_image
                .as_deref()
                .and_then(|key| asset_url(activity.application_id, key))
            {
                return Some(url);
            }

            if let Some(app_id) = activity.application_id {
                let app_id = app_id.to_string();
                if self.apps.iter().any(|app| app.id == app_id) {
                    if let Some(url) = self.rpc_icon_url(&app_id).await {
                        return Some(url);
                    }
                }
            }

            if let Some(app) = find_app_by_name(&self.apps, &activity.name) {
                if let Some(url) = self.rpc_icon_url(&app.id).await {
                    return Some(url);
                }
            }
        }

        if from_steam {
            if let Some(app) = self
                .steam_apps
                .iter()
                .find(|app| app.name == activity.name)
            {
                tracing::debug!(appid = app.appid, name = %app.name, "found steam app by name");

                for ext in ["png", "jpg"] {
                    let url = format!("{}/{}/logo.{}", STORE_CDN_BASE, app.appid, ext);
                    if self.resource_exists(&url).await {
                        return Some(url);
                    }
                }
            }
        }

        None
    }

    async fn rpc_icon_url(&self, app_id: &str) -> Option<String> {
        match self.fetch_rpc(app_id).await {
            Ok(rpc) => {
                tracing::debug!(app_id = %app_id, icon = ?rpc.icon, "found discord application");
                rpc.icon
                    .map(|icon| format!("{}/app-icons/{}/{}.png", CDN_BASE, rpc.id, icon))
            }
            Err(e) => {
                tracing::warn!(err = ?e, app_id = %app_id, "an error occurred when fetching application rpc data");
                None
            }
        }
    }

    async fn fetch_rpc(&self, app_id: &str) -> anyhow::Result<RpcApplication> {
        let rpc = self
            .client
            .get(format!("{}/applications/{}/rpc", API_BASE, app_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(rpc)
    }

    async fn resource_exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::warn!(err = ?e, url = %url, "an error occurred when probing resource");
                false
            }
        }
    }

    /// Downloads the resolved icon and installs it as a guild emoji named
    /// after the game.
    pub async fn upload_game_emoji(
        &self,
        http: &serenity::Http,
        guild_id: serenity::GuildId,
        game: &str,
        url: &str,
    ) -> Result<serenity::Emoji, Error> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let Some(ext) = detect_image_format(&bytes) else {
            return Err(format!("unsupported image format at {url}").into());
        };

        let name = emoji_name(game);
        let attachment = serenity::CreateAttachment::bytes(bytes.to_vec(), format!("{name}.{ext}"));

        let emoji = guild_id
            .create_emoji(http, &name, &attachment.to_base64())
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, game = %game, "an error occurred when creating emoji"),
            )?;

        Ok(emoji)
    }
}

/// Turns a rich-presence asset key into a CDN URL. `mp:` keys point into
/// the media proxy, everything else is an application asset.
pub(crate) fn asset_url(application_id: Option<u64>, key: &str) -> Option<String> {
    if let Some(path) = key.strip_prefix("mp:") {
        return Some(format!("{}/{}", MEDIA_PROXY_BASE, path));
    }

    application_id.map(|id| format!("{}/app-assets/{}/{}.png", CDN_BASE, id, key))
}

pub(crate) fn find_app_by_name<'a>(
    apps: &'a [DetectableApplication],
    name: &str,
) -> Option<&'a DetectableApplication> {
    apps.iter()
        .find(|app| app.name == name || app.aliases.iter().any(|alias| alias == name))
}

/// Emoji names must be 2..=32 word characters.
pub(crate) fn emoji_name(game: &str) -> String {
    let mut name: String = game
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    name.truncate(32);

    if name.trim_matches('_').len() < 2 {
        name = String::from("game");
    }

    name
}

pub(crate) fn detect_image_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(b"\xff\xd8\xff") {
        Some("jpg")
    } else if bytes.starts_with(b"GIF8") {
        Some("gif")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str, name: &str, aliases: &[&str]) -> DetectableApplication {
        DetectableApplication {
            id: id.to_string(),
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn media_proxy_keys_resolve_without_an_application() {
        let url = asset_url(None, "mp:external/abc123/https/example.com/cover.png");

        assert_eq!(
            url.as_deref(),
            Some("https://media.discordapp.net/external/abc123/https/example.com/cover.png")
        );
    }

    #[test]
    fn plain_keys_need_an_application_id() {
        assert_eq!(asset_url(None, "565234"), None);

        let url = asset_url(Some(427520), "565234");
        assert_eq!(
            url.as_deref(),
            Some("https://cdn.discordapp.com/app-assets/427520/565234.png")
        );
    }

    #[test]
    fn apps_match_by_name_or_alias() {
        let apps = vec![
            app("1", "Factorio", &[]),
            app("2", "Counter-Strike 2", &["CS2", "CS:GO"]),
        ];

        assert_eq!(find_app_by_name(&apps, "Factorio").map(|a| a.id.as_str()), Some("1"));
        assert_eq!(find_app_by_name(&apps, "CS2").map(|a| a.id.as_str()), Some("2"));
        assert!(find_app_by_name(&apps, "Dota 2").is_none());
    }

    #[test]
    fn emoji_names_are_sanitized() {
        assert_eq!(emoji_name("Factorio"), "factorio");
        assert_eq!(emoji_name("Counter-Strike 2"), "counter_strike_2");
        assert_eq!(emoji_name("艦これ"), "game");
        assert_eq!(emoji_name(&"x".repeat(50)).len(), 32);
    }

    #[test]
    fn image_formats_detect_by_magic_bytes() {
        assert_eq!(detect_image_format(b"\x89PNG\r\n\x1a\nrest"), Some("png"));
        assert_eq!(detect_image_format(b"\xff\xd8\xff\xe0rest"), Some("jpg"));
        assert_eq!(detect_image_format(b"GIF89a"), Some("gif"));
        assert_eq!(detect_image_format(b"plain text"), None);
    }
}
