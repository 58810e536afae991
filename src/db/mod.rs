//! Database module - SQLite storage for content, characters and combats

#[cfg(test)]
pub mod test_utils;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Database handle wrapping SQLite connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    /// If path is None, uses in-memory database (for testing)
    pub async fn new(path: Option<&str>) -> Result<Self> {
        let conn_str = match path {
            Some(p) => format!("sqlite:{}?mode=rwc", p),
            None => "sqlite::memory:".to_string(),
        };

        let options = SqliteConnectOptions::from_str(&conn_str)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        // Every connection to ":memory:" is a separate database, so the
        // in-memory pool pins exactly one connection for its whole life.
        let pool_options = match path {
            Some(_) => SqlitePoolOptions::new().max_connections(10),
            None => SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        };

        let pool = pool_options.connect_with(options).await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        // Authored content
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS archetypes (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                bonuses TEXT NOT NULL DEFAULT '{}',
                starting_ability_ids TEXT NOT NULL DEFAULT '[]',
                learnable_ability_ids TEXT NOT NULL DEFAULT '[]'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS abilities (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                effect TEXT,
                talent_point_cost INTEGER NOT NULL DEFAULT 0,
                level_requirement INTEGER NOT NULL DEFAULT 1,
                prerequisites TEXT NOT NULL DEFAULT '[]',
                allowed_archetype_ids TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                effect TEXT,
                usable INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS enemies (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                health INTEGER NOT NULL CHECK (health > 0),
                skill INTEGER NOT NULL,
                damage INTEGER NOT NULL DEFAULT 5,
                xp_reward INTEGER NOT NULL DEFAULT 0,
                special_attack TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Story nodes that start a fight, with their victory/defeat branches
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS story_nodes (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                enemy_id INTEGER REFERENCES enemies(id),
                victory_node_id INTEGER,
                defeat_node_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Characters and their progress
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                health INTEGER NOT NULL,
                max_health INTEGER NOT NULL,
                skill INTEGER NOT NULL,
                luck INTEGER NOT NULL,
                stamina INTEGER NOT NULL,
                defense INTEGER NOT NULL,
                level INTEGER NOT NULL DEFAULT 1,
                xp INTEGER NOT NULL DEFAULT 0,
                xp_to_next_level INTEGER NOT NULL,
                talent_points INTEGER NOT NULL DEFAULT 0,
                archetype_id INTEGER REFERENCES archetypes(id),
                weapon_id INTEGER REFERENCES items(id),
                armor_id INTEGER REFERENCES items(id),
                current_node_id INTEGER,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (health >= 0 AND health <= max_health)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS character_abilities (
                character_id INTEGER NOT NULL REFERENCES characters(id) ON DELETE CASCADE,
                ability_id INTEGER NOT NULL REFERENCES abilities(id),
                learned_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (character_id, ability_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS character_items (
                character_id INTEGER NOT NULL REFERENCES characters(id) ON DELETE CASCADE,
                item_id INTEGER NOT NULL REFERENCES items(id),
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                PRIMARY KEY (character_id, item_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // At most one fight per character: the character id is the key
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS active_combats (
                character_id INTEGER PRIMARY KEY REFERENCES characters(id) ON DELETE CASCADE,
                enemy_id INTEGER NOT NULL REFERENCES enemies(id),
                node_id INTEGER,
                enemy_health INTEGER NOT NULL CHECK (enemy_health >= 0),
                enemy_charge_turns INTEGER NOT NULL DEFAULT 0 CHECK (enemy_charge_turns >= 0),
                defended_while_charging INTEGER NOT NULL DEFAULT 0,
                player_stamina INTEGER NOT NULL,
                buffs TEXT NOT NULL DEFAULT '[]',
                round INTEGER NOT NULL DEFAULT 0,
                started_at TEXT NOT NULL,
                last_action_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_story_nodes_enemy ON story_nodes(enemy_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_active_combats_last_action ON active_combats(last_action_at)",
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check if database is healthy
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
