use anyhow::Result;
use std::fmt::Write as _;

use crate::database_ops::db::{Db, TableCounts};

/// Plain-text row-count report for the ingest tables.
pub fn render(counts: &TableCounts) -> String {
    let mut out = String::new();
    let rows = [
        ("games", counts.games),
        ("categories", counts.categories),
        ("genres", counts.genres),
        ("game_categories", counts.game_categories),
        ("game_genres", counts.game_genres),
    ];
    for (table, n) in rows {
        let _ = writeln!(out, "{table:<16} {n:>8}");
    }
    out
}

pub async fn run(db: &Db) -> Result<String> {
    let counts = db.table_counts().await?;
    Ok(render(&counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_line_per_table() {
        let out = render(&TableCounts {
            games: 3,
            categories: 2,
            genres: 1,
            game_categories: 4,
            game_genres: 3,
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("games"));
        assert!(lines[0].ends_with('3'));
        assert!(lines[3].starts_with("game_categories"));
    }

    #[tokio::test]
    async fn run_reports_empty_store() {
        let db = Db::in_memory().await.unwrap();
        let out = run(&db).await.unwrap();
        assert!(out.lines().all(|l| l.trim_end().ends_with(" 0")));
    }
}
