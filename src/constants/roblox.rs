pub static PRESENCE_ENDPOINT: &str = "https://presence.roblox.com/v1/presence/users";

/// `userPresenceType` value for a user who is currently in a game.
pub const PRESENCE_IN_GAME: i64 = 2;
