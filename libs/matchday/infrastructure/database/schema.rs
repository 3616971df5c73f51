use sqlx::SqlitePool;
use tracing::{debug, info};

pub const SCHEMA_VERSION: i64 = 1;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS api_cache (
        cache_key TEXT PRIMARY KEY,
        endpoint TEXT NOT NULL,
        parameters TEXT NOT NULL,
        response TEXT NOT NULL,
        has_data INTEGER NOT NULL,
        is_error INTEGER NOT NULL,
        ttl_seconds INTEGER NOT NULL,
        cached_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_api_cache_endpoint ON api_cache(endpoint)",
    r#"
    CREATE TABLE IF NOT EXISTS live_matches (
        fixture_id INTEGER PRIMARY KEY,
        league_id INTEGER NOT NULL,
        league_name TEXT NOT NULL,
        league_season INTEGER,
        home_team_id INTEGER NOT NULL,
        home_team_name TEXT NOT NULL,
        away_team_id INTEGER NOT NULL,
        away_team_name TEXT NOT NULL,
        status_long TEXT NOT NULL,
        status_short TEXT NOT NULL,
        elapsed_minutes INTEGER,
        home_score INTEGER NOT NULL,
        away_score INTEGER NOT NULL,
        match_date TEXT NOT NULL,
        venue_name TEXT,
        venue_city TEXT,
        referee TEXT,
        round TEXT,
        last_updated TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS live_match_events (
        fixture_id INTEGER NOT NULL,
        time_elapsed INTEGER NOT NULL,
        time_extra INTEGER,
        team_id INTEGER,
        team_name TEXT,
        player_id INTEGER NOT NULL DEFAULT 0,
        player_name TEXT,
        assist_id INTEGER,
        assist_name TEXT,
        event_type TEXT NOT NULL,
        detail TEXT,
        comments TEXT,
        PRIMARY KEY (fixture_id, time_elapsed, event_type, player_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS live_match_statistics (
        fixture_id INTEGER NOT NULL,
        team_id INTEGER NOT NULL,
        team_name TEXT,
        statistics TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (fixture_id, team_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rate_limit_hits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host TEXT NOT NULL,
        hit_at_ms INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_rate_limit_hits_host ON rate_limit_hits(host, hit_at_ms)",
    r#"
    CREATE TABLE IF NOT EXISTS job_leases (
        name TEXT PRIMARY KEY,
        holder TEXT NOT NULL,
        acquired_at_ms INTEGER NOT NULL,
        expires_at_ms INTEGER NOT NULL
    )
    "#,
];

/// Create every table and index if missing and record the schema version
pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in TABLES {
        sqlx::query(statement).execute(pool).await?;
    }

    let current = get_schema_version(pool).await?;
    if current < SCHEMA_VERSION {
        sqlx::query("INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(SCHEMA_VERSION)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(pool)
            .await?;
        info!("Database schema at version {}", SCHEMA_VERSION);
    } else {
        debug!("Database schema up to date (version {})", current);
    }

    Ok(())
}

/// Highest applied schema version, 0 on a fresh database
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (version,) =
        sqlx::query_as::<_, (i64,)>("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(pool)
            .await?;
    Ok(version)
}
