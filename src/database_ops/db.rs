use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS games (
        appid INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        release_date TEXT,
        price INTEGER,
        is_free BOOLEAN
    )",
    "CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS genres (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS game_categories (
        game_id INTEGER NOT NULL REFERENCES games(appid),
        category_id INTEGER NOT NULL REFERENCES categories(id),
        PRIMARY KEY (game_id, category_id)
    )",
    "CREATE TABLE IF NOT EXISTS game_genres (
        game_id INTEGER NOT NULL REFERENCES games(appid),
        genre_id INTEGER NOT NULL REFERENCES genres(id),
        PRIMARY KEY (game_id, genre_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_games_name ON games(name)",
    "CREATE INDEX IF NOT EXISTS idx_categories_name ON categories(name)",
    "CREATE INDEX IF NOT EXISTS idx_genres_name ON genres(name)",
    "CREATE INDEX IF NOT EXISTS idx_game_categories_game_id ON game_categories(game_id)",
    "CREATE INDEX IF NOT EXISTS idx_game_genres_game_id ON game_genres(game_id)",
];

#[derive(Clone)]
pub struct Db {
    pub pool: SqlitePool,
}

impl Db {
    /// Open (creating if needed) the database file and ensure the schema exists.
    #[instrument]
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;
        info!(path = %path.display(), "connected to db");

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Private in-memory database. One pinned connection, since every
    /// `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("failed to open in-memory sqlite database")?;
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(*stmt)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to apply schema statement: {stmt}"))?;
        }
        Ok(())
    }

    pub async fn table_counts(&self) -> Result<TableCounts> {
        async fn count(pool: &SqlitePool, table: &str) -> Result<i64> {
            sqlx::query_scalar::<_, i64>(&format!("SELECT count(*) FROM {table}"))
                .fetch_one(pool)
                .await
                .with_context(|| format!("failed to count {table}"))
        }
        Ok(TableCounts {
            games: count(&self.pool, "games").await?,
            categories: count(&self.pool, "categories").await?,
            genres: count(&self.pool, "genres").await?,
            game_categories: count(&self.pool, "game_categories").await?,
            game_genres: count(&self.pool, "game_genres").await?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub games: i64,
    pub categories: i64,
    pub genres: i64,
    pub game_categories: i64,
    pub game_genres: i64,
}
