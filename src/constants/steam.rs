pub static PLAYER_SUMMARIES_ENDPOINT: &str =
    "https://api.steampowered.com/ISteamUser/GetPlayerSummaries/v2/";
pub static APP_LIST_ENDPOINT: &str = "https://api.steampowered.com/ISteamApps/GetAppList/v2/";
pub static STORE_CDN_BASE: &str = "https://cdn.cloudflare.steamstatic.com/steam/apps";
