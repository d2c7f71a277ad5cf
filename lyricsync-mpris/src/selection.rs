//! Which bus names count as players and which of them to follow.

use lyricsync_core::config::PlayerConfig;

/// Well-known name prefix every MPRIS player owns.
pub const MPRIS_NAME_PREFIX: &str = "org.mpris.MediaPlayer2.";

#[must_use]
pub fn is_mpris_name(name: &str) -> bool {
    name.starts_with(MPRIS_NAME_PREFIX)
}

/// Apply the include/exclude filters to a player bus name.
///
/// With a non-empty include list the name must contain one of its entries.
/// It must then contain none of the excluded entries.
#[must_use]
pub fn player_allowed(name: &str, filter: &PlayerConfig) -> bool {
    if !is_mpris_name(name) {
        return false;
    }
    if !filter.included.is_empty() && !filter.included.iter().any(|f| name.contains(f.as_str())) {
        return false;
    }
    !filter.excluded.iter().any(|f| name.contains(f.as_str()))
}

/// Pick the player to follow from the names currently on the bus.
///
/// The current player is kept while it is still present and allowed.
pub(crate) fn choose_player<'a>(
    names: &'a [String],
    current: Option<&str>,
    filter: &PlayerConfig,
) -> Option<&'a str> {
    if let Some(current) = current {
        if let Some(name) = names.iter().find(|n| n.as_str() == current) {
            if player_allowed(name, filter) {
                return Some(name);
            }
        }
    }
    names
        .iter()
        .map(String::as_str)
        .find(|name| player_allowed(name, filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(included: &[&str], excluded: &[&str]) -> PlayerConfig {
        PlayerConfig {
            included: included.iter().map(ToString::to_string).collect(),
            excluded: excluded.iter().map(ToString::to_string).collect(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_non_mpris_names_rejected() {
        assert!(!player_allowed("org.freedesktop.Notifications", &PlayerConfig::default()));
        assert!(player_allowed("org.mpris.MediaPlayer2.spotify", &PlayerConfig::default()));
    }

    #[test]
    fn test_include_list_must_match() {
        let f = filter(&["spotify"], &[]);
        assert!(player_allowed("org.mpris.MediaPlayer2.spotify", &f));
        assert!(!player_allowed("org.mpris.MediaPlayer2.firefox.instance123", &f));
    }

    #[test]
    fn test_exclude_list_wins() {
        let f = filter(&["MediaPlayer2"], &["firefox"]);
        assert!(!player_allowed("org.mpris.MediaPlayer2.firefox.instance123", &f));
        assert!(player_allowed("org.mpris.MediaPlayer2.mpv", &f));
    }

    #[test]
    fn test_choose_keeps_current_player() {
        let bus = names(&[
            "org.mpris.MediaPlayer2.mpv",
            "org.mpris.MediaPlayer2.spotify",
        ]);
        let chosen = choose_player(
            &bus,
            Some("org.mpris.MediaPlayer2.spotify"),
            &PlayerConfig::default(),
        );
        assert_eq!(chosen, Some("org.mpris.MediaPlayer2.spotify"));
    }

    #[test]
    fn test_choose_replaces_vanished_player() {
        let bus = names(&["org.freedesktop.DBus", "org.mpris.MediaPlayer2.mpv"]);
        let chosen = choose_player(
            &bus,
            Some("org.mpris.MediaPlayer2.spotify"),
            &PlayerConfig::default(),
        );
        assert_eq!(chosen, Some("org.mpris.MediaPlayer2.mpv"));
    }

    #[test]
    fn test_choose_none_when_all_filtered() {
        let bus = names(&["org.mpris.MediaPlayer2.firefox"]);
        assert_eq!(choose_player(&bus, None, &filter(&[], &["firefox"])), None);
    }
}
