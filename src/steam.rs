use std::collections::HashMap;

use async_trait::async_trait;

use crate::constants::steam::PLAYER_SUMMARIES_ENDPOINT;
use crate::models::steam::PlayerSummariesResponse;
use crate::poller::{check_response, FetchError, PresenceFetcher};

/// Looks up what linked Steam accounts are playing through the official
/// `GetPlayerSummaries` endpoint.
#[derive(Clone)]
pub struct SteamFetcher {
    client: reqwest::Client,
    api_key: String,
}

impl SteamFetcher {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl PresenceFetcher for SteamFetcher {
    fn service(&self) -> &'static str {
        "steam"
    }

    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, Vec<String>>, FetchError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let resp = self
            .client
            .get(PLAYER_SUMMARIES_ENDPOINT)
            .query(&[
                ("key", self.api_key.as_str()),
                ("steamids", ids.join(",").as_str()),
            ])
            .send()
            .await?;

        let body: PlayerSummariesResponse = check_response(resp)?.json().await?;

        for player in &body.response.players {
            tracing::trace!(
                steam_id = %player.steam_id,
                persona = %player.persona_name,
                game = ?player.game_name,
                game_id = ?player.game_id,
                "got player summary"
            );
        }

        Ok(summaries_to_games(body))
    }
}

/// A player maps to the game named in their summary, or to no games when
/// they aren't in one.
pub(crate) fn summaries_to_games(body: PlayerSummariesResponse) -> HashMap<String, Vec<String>> {
    body.response
        .players
        .into_iter()
        .map(|player| {
            let games = player
                .game_name
                .filter(|name| !name.is_empty())
                .map(|name| vec![name])
                .unwrap_or_default();

            (player.steam_id, games)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_map_to_current_games() {
        let body: PlayerSummariesResponse = serde_json::from_str(
            r#"{
                "response": {
                    "players": [
                        {
                            "steamid": "76561198000000001",
                            "communityvisibilitystate": 3,
                            "profilestate": 1,
                            "personaname": "factorio enjoyer",
                            "profileurl": "https://steamcommunity.com/id/factorio-enjoyer/",
                            "avatar": "https://avatars.steamstatic.com/a.jpg",
                            "avatarmedium": "https://avatars.steamstatic.com/a_medium.jpg",
                            "avatarfull": "https://avatars.steamstatic.com/a_full.jpg",
                            "avatarhash": "deadbeef",
                            "lastlogoff": 1722430000,
                            "personastate": 1,
                            "primaryclanid": "103582791429521408",
                            "timecreated": 1100000000,
                            "personastateflags": 0,
                            "gameextrainfo": "Factorio",
                            "gameid": "427520"
                        },
                        {
                            "steamid": "76561198000000002",
                            "communityvisibilitystate": 1,
                            "profilestate": 1,
                            "personaname": "idle",
                            "profileurl": "https://steamcommunity.com/id/idle/",
                            "avatar": "https://avatars.steamstatic.com/b.jpg",
                            "avatarmedium": "https://avatars.steamstatic.com/b_medium.jpg",
                            "avatarfull": "https://avatars.steamstatic.com/b_full.jpg",
                            "avatarhash": "cafebabe",
                            "personastate": 0
                        }
                    ]
                }
            }"#,
        )
        .unwrap();

        let games = summaries_to_games(body);

        assert_eq!(
            games["76561198000000001"],
            vec!["Factorio".to_string()]
        );
        assert!(games["76561198000000002"].is_empty());
    }

    #[test]
    fn empty_response_maps_to_nothing() {
        let body: PlayerSummariesResponse =
            serde_json::from_str(r#"{"response": {"players": []}}"#).unwrap();

        assert!(summaries_to_games(body).is_empty());
    }
}
