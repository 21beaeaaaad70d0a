use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct PlayerSummariesResponse {
    pub response: PlayerSummaries,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlayerSummaries {
    #[serde(default)]
    pub players: Vec<PlayerSummary>,
}

/// One entry of the `GetPlayerSummaries` response, trimmed to the fields
/// the bot consumes. The game fields are only present while the player is
/// in a game.
///
/// https://developer.valvesoftware.com/wiki/Steam_Web_API#GetPlayerSummaries_.28v0002.29
#[derive(Clone, Debug, Deserialize)]
pub struct PlayerSummary {
    #[serde(rename = "steamid")]
    pub steam_id: String,
    #[serde(rename = "personaname", default)]
    pub persona_name: String,
    #[serde(rename = "gameextrainfo", default)]
    pub game_name: Option<String>,
    #[serde(rename = "gameid", default)]
    pub game_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppListResponse {
    pub applist: AppList,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppList {
    #[serde(default)]
    pub apps: Vec<SteamApp>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SteamApp {
    pub appid: u64,
    pub name: String,
}
