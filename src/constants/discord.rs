pub static API_BASE: &str = "https://discord.com/api/v10";
pub static CDN_BASE: &str = "https://cdn.discordapp.com";
pub static MEDIA_PROXY_BASE: &str = "https://media.discordapp.net";

/// Hard cap Discord enforces on voice channel status strings.
pub const MAX_STATUS_LEN: usize = 500;
