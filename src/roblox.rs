use std::collections::HashMap;

use async_trait::async_trait;

use crate::constants::roblox::{PRESENCE_ENDPOINT, PRESENCE_IN_GAME};
use crate::models::roblox::{PresenceRequest, PresenceResponse};
use crate::poller::{check_response, FetchError, PresenceFetcher};

/// Looks up whether linked Roblox accounts are in a game. The presence API
/// doesn't say which experience, so an in-game user just counts as playing
/// "Roblox".
#[derive(Clone)]
pub struct RobloxFetcher {
    client: reqwest::Client,
}

impl RobloxFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PresenceFetcher for RobloxFetcher {
    fn service(&self) -> &'static str {
        "roblox"
    }

    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, Vec<String>>, FetchError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let user_ids: Vec<u64> = ids
            .iter()
            .filter_map(|id| {
                id.parse()
                    .inspect_err(
                        |e| tracing::warn!(err = ?e, id = %id, "skipping non-numeric roblox id"),
                    )
                    .ok()
            })
            .collect();

        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let resp = self
            .client
            .post(PRESENCE_ENDPOINT)
            .json(&PresenceRequest { user_ids })
            .send()
            .await?;

        let body: PresenceResponse = check_response(resp)?.json().await?;

        Ok(presences_to_games(body))
    }
}

pub(crate) fn presences_to_games(body: PresenceResponse) -> HashMap<String, Vec<String>> {
    body.user_presences
        .into_iter()
        .map(|presence| {
            let games = if presence.user_presence_type == PRESENCE_IN_GAME {
                vec!["Roblox".to_string()]
            } else {
                Vec::new()
            };

            (presence.user_id.to_string(), games)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_in_game_users_count_as_playing() {
        let body: PresenceResponse = serde_json::from_str(
            r#"{
                "userPresences": [
                    {"userId": 1, "userPresenceType": 2, "lastLocation": "Natural Disaster Survival"},
                    {"userId": 2, "userPresenceType": 1},
                    {"userId": 3, "userPresenceType": 0}
                ]
            }"#,
        )
        .unwrap();

        let games = presences_to_games(body);

        assert_eq!(games["1"], vec!["Roblox".to_string()]);
        assert!(games["2"].is_empty());
        assert!(games["3"].is_empty());
    }

    #[test]
    fn missing_presence_list_maps_to_nothing() {
        let body: PresenceResponse = serde_json::from_str("{}").unwrap();
        assert!(presences_to_games(body).is_empty());
    }
}
