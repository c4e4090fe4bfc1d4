//! Star schema: one player dimension, one player-season fact table

/// Statements run by [`crate::Warehouse::migrate`], in order. All are idempotent.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS dim_players (
        player_id    TEXT PRIMARY KEY,
        name         TEXT NOT NULL,
        position     TEXT NOT NULL CHECK (position IN ('QB', 'WR')),
        draft_year   INTEGER,
        height       INTEGER,
        weight       INTEGER,
        current_team TEXT,
        created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fact_player_seasons (
        player_id         TEXT NOT NULL REFERENCES dim_players (player_id),
        season_year       INTEGER NOT NULL,
        team              TEXT,
        games             INTEGER NOT NULL CHECK (games >= 0),
        snaps             INTEGER,
        attempts          INTEGER NOT NULL DEFAULT 0,
        completions       INTEGER NOT NULL DEFAULT 0,
        yards             INTEGER NOT NULL DEFAULT 0,
        tds               INTEGER NOT NULL DEFAULT 0,
        ints              INTEGER NOT NULL DEFAULT 0,
        snap_efficiency   REAL,
        yards_per_attempt REAL,
        weekly_cv         REAL,
        consistency_score REAL CHECK (consistency_score IS NULL OR consistency_score BETWEEN 0 AND 100),
        loaded_at         TEXT NOT NULL,
        PRIMARY KEY (player_id, season_year)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_dim_players_position ON dim_players (position)",
    "CREATE INDEX IF NOT EXISTS idx_fact_player_seasons_season ON fact_player_seasons (season_year)",
    "CREATE INDEX IF NOT EXISTS idx_fact_player_seasons_player ON fact_player_seasons (player_id)",
];

