//! Insert-if-absent persistence of normalized games and their category/genre links.
//!
//! Every write is conditional (`ON CONFLICT .. DO NOTHING`), so applying the same
//! batch again, or a superset of it, leaves existing rows untouched. Each game is
//! written in its own transaction; a failure rolls back that game only.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::ops::AddAssign;
use tracing::{debug, info, instrument};

use super::db::Db;
use crate::normalization::game::{Game, NormalizedGame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Taxonomy {
    Category,
    Genre,
}

impl Taxonomy {
    fn table(self) -> &'static str {
        match self {
            Taxonomy::Category => "categories",
            Taxonomy::Genre => "genres",
        }
    }

    fn junction(self) -> &'static str {
        match self {
            Taxonomy::Category => "game_categories",
            Taxonomy::Genre => "game_genres",
        }
    }

    fn fk_column(self) -> &'static str {
        match self {
            Taxonomy::Category => "category_id",
            Taxonomy::Genre => "genre_id",
        }
    }
}

/// Rows newly inserted by a persist call. Already-present rows are not counted
/// except for `games_existing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    pub games_inserted: usize,
    pub games_existing: usize,
    pub categories_inserted: usize,
    pub genres_inserted: usize,
    pub category_links_inserted: usize,
    pub genre_links_inserted: usize,
}

impl AddAssign for PersistSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.games_inserted += rhs.games_inserted;
        self.games_existing += rhs.games_existing;
        self.categories_inserted += rhs.categories_inserted;
        self.genres_inserted += rhs.genres_inserted;
        self.category_links_inserted += rhs.category_links_inserted;
        self.genre_links_inserted += rhs.genre_links_inserted;
    }
}

/// Returns true when the row was inserted, false when `appid` already existed.
async fn ensure_game(conn: &mut SqliteConnection, game: &Game) -> Result<bool> {
    let res = sqlx::query(
        "INSERT INTO games (appid, name, description, release_date, price, is_free) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT (appid) DO NOTHING",
    )
    .bind(game.appid)
    .bind(&game.name)
    .bind(&game.description)
    .bind(&game.release_date)
    .bind(game.price_cents)
    .bind(game.is_free)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected() == 1)
}

/// Id of the named category/genre, inserting it first when absent.
async fn ensure_term(conn: &mut SqliteConnection, kind: Taxonomy, name: &str) -> Result<(i64, bool)> {
    let inserted = sqlx::query(&format!(
        "INSERT INTO {} (name) VALUES (?) ON CONFLICT (name) DO NOTHING",
        kind.table()
    ))
    .bind(name)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        == 1;

    let id: i64 = sqlx::query_scalar(&format!("SELECT id FROM {} WHERE name = ?", kind.table()))
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    if inserted {
        debug!(table = kind.table(), name, id, "term inserted");
    }
    Ok((id, inserted))
}

async fn link_term(
    conn: &mut SqliteConnection,
    kind: Taxonomy,
    appid: i64,
    term_id: i64,
) -> Result<bool> {
    let res = sqlx::query(&format!(
        "INSERT INTO {} (game_id, {}) VALUES (?, ?) ON CONFLICT DO NOTHING",
        kind.junction(),
        kind.fk_column()
    ))
    .bind(appid)
    .bind(term_id)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected() == 1)
}

async fn ensure_terms(
    tx: &mut Transaction<'_, Sqlite>,
    kind: Taxonomy,
    appid: i64,
    names: &[String],
) -> Result<(usize, usize)> {
    let (mut terms, mut links) = (0, 0);
    for name in names {
        let (term_id, inserted) = ensure_term(&mut *tx, kind, name).await?;
        terms += usize::from(inserted);
        links += usize::from(link_term(&mut *tx, kind, appid, term_id).await?);
    }
    Ok((terms, links))
}

/// Write one game with its links in a single transaction.
#[instrument(skip(db, item), fields(appid = item.game.appid))]
pub async fn persist_game(db: &Db, item: &NormalizedGame) -> Result<PersistSummary> {
    let mut tx = db.pool.begin().await?;
    let mut summary = PersistSummary::default();

    if ensure_game(&mut tx, &item.game).await? {
        summary.games_inserted = 1;
    } else {
        summary.games_existing = 1;
    }
    let (categories, category_links) =
        ensure_terms(&mut tx, Taxonomy::Category, item.game.appid, &item.categories).await?;
    let (genres, genre_links) =
        ensure_terms(&mut tx, Taxonomy::Genre, item.game.appid, &item.genres).await?;
    summary.categories_inserted = categories;
    summary.category_links_inserted = category_links;
    summary.genres_inserted = genres;
    summary.genre_links_inserted = genre_links;

    tx.commit().await?;
    Ok(summary)
}

/// Persist a whole run's output, stopping at the first failing game.
/// Games written before the failure stay committed.
pub async fn persist_all(db: &Db, items: &[NormalizedGame]) -> Result<PersistSummary> {
    let mut total = PersistSummary::default();
    for item in items {
        let s = persist_game(db, item)
            .await
            .with_context(|| format!("failed to persist appid {}", item.game.appid))?;
        total += s;
    }
    info!(
        games_inserted = total.games_inserted,
        games_existing = total.games_existing,
        categories_inserted = total.categories_inserted,
        genres_inserted = total.genres_inserted,
        "persisted batch"
    );
    Ok(total)
}
