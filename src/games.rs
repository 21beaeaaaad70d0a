use std::collections::HashMap;

use crate::config::EmojiOverride;
use crate::constants::discord::MAX_STATUS_LEN;

/// One line of the channel summary: a game (or a group of games sharing an
/// emoji) and how many members are in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameTally {
    pub name: String,
    pub emoji: Option<String>,
    pub count: u32,
}

/// Groups the raw game names of a channel's members into tallies.
///
/// Identical names accumulate. An override can rename a game and attach an
/// emoji; two different games configured with the same emoji collapse into
/// one tally, and a game marked as ignored disappears entirely. The result
/// is sorted by member count, first-seen order on ties.
pub fn tally_games(games: &[String], overrides: &HashMap<String, EmojiOverride>) -> Vec<GameTally> {
    let mut tallies: Vec<GameTally> = Vec::new();
    // raw game name -> index of the tally it accumulates into
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for game in games {
        if let Some(&idx) = slots.get(game.as_str()) {
            tallies[idx].count += 1;
            continue;
        }

        let config = overrides.get(game);

        if config.is_some_and(|c| c.ignore) {
            continue;
        }

        let display_name = config.and_then(|c| c.display_name.clone());
        let emoji = config.and_then(|c| c.emoji.clone());

        // a game whose emoji is already on the board joins that tally
        if let Some(emoji) = &emoji {
            if let Some(idx) = tallies
                .iter()
                .position(|tally| tally.emoji.as_deref() == Some(emoji))
            {
                tallies[idx].count += 1;
                if let Some(display_name) = display_name {
                    tallies[idx].name = display_name;
                }
                slots.insert(game.as_str(), idx);
                continue;
            }
        }

        slots.insert(game.as_str(), tallies.len());
        tallies.push(GameTally {
            name: display_name.unwrap_or_else(|| game.clone()),
            emoji,
            count: 1,
        });
    }

    tallies.sort_by(|a, b| b.count.cmp(&a.count));
    tallies
}

/// Builds the voice channel status message out of the tallies.
///
/// A single game is shown by name (with its emoji if it has one). Several
/// games collapse to their emojis only, keeping the name when exactly one
/// of them has an emoji, and falling back to a generic count when none do.
pub fn compose_status(tallies: &[GameTally]) -> String {
    let message = match tallies {
        [] => String::new(),
        [only] => match &only.emoji {
            Some(emoji) => format!("{} {}", emoji, only.name),
            None => only.name.clone(),
        },
        _ => {
            let with_emoji: Vec<&GameTally> =
                tallies.iter().filter(|tally| tally.emoji.is_some()).collect();

            match with_emoji.as_slice() {
                [] => format!("Playing {} games", tallies.len()),
                [single] => format!(
                    "{} {}",
                    single.emoji.as_deref().unwrap_or_default(),
                    single.name
                ),
                several => several
                    .iter()
                    .filter_map(|tally| tally.emoji.as_deref())
                    .collect::<Vec<_>>()
                    .join(" "),
            }
        }
    };

    truncate_status(message)
}

/// Cuts the message down to the length Discord accepts, on a char boundary.
pub fn truncate_status(mut message: String) -> String {
    if let Some((idx, _)) = message.char_indices().nth(MAX_STATUS_LEN) {
        message.truncate(idx);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn games(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn override_with(emoji: Option<&str>, display_name: Option<&str>) -> EmojiOverride {
        EmojiOverride {
            emoji: emoji.map(String::from),
            display_name: display_name.map(String::from),
            ignore: false,
        }
    }

    #[test]
    fn identical_games_accumulate() {
        let tallies = tally_games(
            &games(&["Factorio", "Factorio", "Dota 2"]),
            &HashMap::new(),
        );

        assert_eq!(tallies.len(), 2);
        assert_eq!(tallies[0].name, "Factorio");
        assert_eq!(tallies[0].count, 2);
        assert_eq!(tallies[1].count, 1);
    }

    #[test]
    fn sorted_by_count_descending() {
        let tallies = tally_games(
            &games(&["A", "B", "B", "B", "C", "C"]),
            &HashMap::new(),
        );

        let counts: Vec<u32> = tallies.iter().map(|t| t.count).collect();
        assert_eq!(counts, vec![3, 2, 1]);
        assert_eq!(tallies[0].name, "B");
    }

    #[test]
    fn override_renames_and_attaches_emoji() {
        let overrides = HashMap::from([(
            "Counter-Strike 2".to_string(),
            override_with(Some("🔫"), Some("CS2")),
        )]);

        let tallies = tally_games(&games(&["Counter-Strike 2"]), &overrides);

        assert_eq!(tallies[0].name, "CS2");
        assert_eq!(tallies[0].emoji.as_deref(), Some("🔫"));
    }

    #[test]
    fn games_sharing_an_emoji_merge() {
        let overrides = HashMap::from([
            ("Overwatch 2".to_string(), override_with(Some("🧡"), None)),
            (
                "Overwatch® 2".to_string(),
                override_with(Some("🧡"), Some("Overwatch")),
            ),
        ]);

        let tallies = tally_games(
            &games(&["Overwatch 2", "Overwatch® 2", "Overwatch® 2"]),
            &overrides,
        );

        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].count, 3);
        // the later title's display name override wins
        assert_eq!(tallies[0].name, "Overwatch");
    }

    #[test]
    fn ignored_games_are_dropped() {
        let overrides = HashMap::from([(
            "Spotify".to_string(),
            EmojiOverride {
                ignore: true,
                ..Default::default()
            },
        )]);

        let tallies = tally_games(&games(&["Spotify", "Factorio"]), &overrides);

        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].name, "Factorio");
    }

    #[test]
    fn no_games_no_message() {
        assert_eq!(compose_status(&[]), "");
    }

    #[test]
    fn single_game_shows_its_name() {
        let tallies = tally_games(&games(&["Factorio"]), &HashMap::new());
        assert_eq!(compose_status(&tallies), "Factorio");
    }

    #[test]
    fn single_game_with_emoji_shows_both() {
        let overrides = HashMap::from([(
            "Factorio".to_string(),
            override_with(Some("🏭"), None),
        )]);

        let tallies = tally_games(&games(&["Factorio"]), &overrides);
        assert_eq!(compose_status(&tallies), "🏭 Factorio");
    }

    #[test]
    fn several_games_show_emojis_only() {
        let overrides = HashMap::from([
            ("Factorio".to_string(), override_with(Some("🏭"), None)),
            ("Dota 2".to_string(), override_with(Some("⚔️"), None)),
        ]);

        let tallies = tally_games(&games(&["Factorio", "Factorio", "Dota 2"]), &overrides);
        assert_eq!(compose_status(&tallies), "🏭 ⚔️");
    }

    #[test]
    fn single_emoji_among_several_games_keeps_its_name() {
        let overrides = HashMap::from([(
            "Factorio".to_string(),
            override_with(Some("🏭"), None),
        )]);

        let tallies = tally_games(&games(&["Factorio", "Dota 2"]), &overrides);
        assert_eq!(compose_status(&tallies), "🏭 Factorio");
    }

    #[test]
    fn several_games_without_emojis_fall_back_to_count() {
        let tallies = tally_games(&games(&["A", "B", "C"]), &HashMap::new());
        assert_eq!(compose_status(&tallies), "Playing 3 games");
    }

    #[test]
    fn long_messages_are_truncated() {
        let tallies = tally_games(&["x".repeat(600)], &HashMap::new());

        let message = compose_status(&tallies);
        assert_eq!(message.chars().count(), MAX_STATUS_LEN);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let message = truncate_status("🏭".repeat(600));

        assert_eq!(message.chars().count(), MAX_STATUS_LEN);
        assert!(message.chars().all(|c| c == '🏭'));
    }
}
