use std::collections::HashSet;

use crate::database_ops::steam::provider::DetailRecord;

/// Row shape of `games`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub appid: i64,
    pub name: String,
    pub description: Option<String>,
    pub release_date: Option<String>,
    pub price_cents: i64,
    pub is_free: bool,
}

/// A game plus the category and genre names it links to. Names are unique per game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedGame {
    pub game: Game,
    pub categories: Vec<String>,
    pub genres: Vec<String>,
}

pub fn normalize(record: DetailRecord) -> NormalizedGame {
    NormalizedGame {
        game: Game {
            appid: record.appid,
            name: record.name,
            description: non_empty(record.description),
            release_date: non_empty(record.release_date),
            price_cents: record.price_cents,
            is_free: record.is_free,
        },
        categories: unique_names(record.categories),
        genres: unique_names(record.genres),
    }
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

// Trimmed, blank-free, first occurrence wins.
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter_map(non_empty)
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DetailRecord {
        DetailRecord {
            appid: 1,
            name: "Foo".into(),
            description: "A game about foo.".into(),
            release_date: "1 Jan, 2020".into(),
            price_cents: 1499,
            is_free: false,
            categories: vec!["Single-player".into(), "Steam Cloud".into()],
            genres: vec!["Action".into()],
        }
    }

    #[test]
    fn maps_attributes_one_to_one() {
        let n = normalize(record());
        assert_eq!(
            n.game,
            Game {
                appid: 1,
                name: "Foo".into(),
                description: Some("A game about foo.".into()),
                release_date: Some("1 Jan, 2020".into()),
                price_cents: 1499,
                is_free: false,
            }
        );
        assert_eq!(n.categories, vec!["Single-player", "Steam Cloud"]);
        assert_eq!(n.genres, vec!["Action"]);
    }

    #[test]
    fn blank_text_becomes_null() {
        let mut r = record();
        r.description = String::new();
        r.release_date = "  ".into();
        let n = normalize(r);
        assert_eq!(n.game.description, None);
        assert_eq!(n.game.release_date, None);
    }

    #[test]
    fn names_are_trimmed_and_deduplicated() {
        let mut r = record();
        r.categories = vec![
            "Single-player".into(),
            " Single-player ".into(),
            "".into(),
            "Co-op".into(),
        ];
        r.genres = vec!["Indie".into(), "Indie".into()];
        let n = normalize(r);
        assert_eq!(n.categories, vec!["Single-player", "Co-op"]);
        assert_eq!(n.genres, vec!["Indie"]);
    }
}
