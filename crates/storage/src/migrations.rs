//! Database migrations

use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 3;

fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    let sql = format!("PRAGMA table_info({table})");
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let rows = match stmt.query_map([], |row| row.get::<_, String>(1)) {
        Ok(r) => r,
        Err(_) => return false,
    };
    for name in rows.flatten() {
        if name == column {
            return true;
        }
    }
    false
}

fn add_column_if_not_exists(
    conn: &Connection,
    table: &str,
    column: &str,
    col_type: &str,
) -> Result<(), rusqlite::Error> {
    if !column_exists(conn, table, column) {
        let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {col_type}");
        conn.execute(&sql, [])?;
    }
    Ok(())
}

pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    let current_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(
        "Database schema version: {} (target: {})",
        current_version,
        SCHEMA_VERSION
    );

    if current_version < 1 {
        tracing::info!("Running migration v1: initial schema");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_session_id TEXT NOT NULL UNIQUE,
                memory_session_id TEXT NOT NULL,
                project TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('active', 'completed')) DEFAULT 'active',
                started_at_epoch INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                memory_session_id TEXT NOT NULL,
                project TEXT NOT NULL,
                observation_type TEXT NOT NULL,
                title TEXT NOT NULL,
                subtitle TEXT,
                narrative TEXT,
                facts TEXT NOT NULL DEFAULT '[]',
                concepts TEXT NOT NULL DEFAULT '[]',
                files_read TEXT NOT NULL DEFAULT '[]',
                files_modified TEXT NOT NULL DEFAULT '[]',
                discovery_tokens INTEGER NOT NULL DEFAULT 0,
                created_at_epoch INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                memory_session_id TEXT NOT NULL,
                project TEXT NOT NULL,
                request TEXT,
                investigated TEXT,
                learned TEXT,
                completed TEXT,
                next_steps TEXT,
                created_at_epoch INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_prompts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_session_id TEXT NOT NULL,
                prompt_number INTEGER NOT NULL,
                prompt_text TEXT NOT NULL,
                project TEXT,
                created_at_epoch INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pending_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES sessions(id),
                payload TEXT NOT NULL,
                created_at_epoch INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_observations_memory ON observations(memory_session_id);
            CREATE INDEX IF NOT EXISTS idx_observations_project ON observations(project);
            CREATE INDEX IF NOT EXISTS idx_observations_created ON observations(created_at_epoch);
            CREATE INDEX IF NOT EXISTS idx_sessions_content ON sessions(content_session_id);
            CREATE INDEX IF NOT EXISTS idx_summaries_memory ON session_summaries(memory_session_id);
            CREATE INDEX IF NOT EXISTS idx_pending_session ON pending_messages(session_id);
            "#,
        )?;
    }

    if current_version < 2 {
        tracing::info!("Running migration v2: session_plans table");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS session_plans (
                session_db_id INTEGER PRIMARY KEY
                    REFERENCES sessions(id) ON DELETE CASCADE,
                plan_path TEXT NOT NULL,
                plan_status TEXT NOT NULL
                    CHECK(plan_status IN ('PENDING', 'COMPLETE', 'VERIFIED'))
                    DEFAULT 'PENDING',
                created_at_epoch INTEGER NOT NULL,
                updated_at_epoch INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_session_plans_path ON session_plans(plan_path);
            "#,
        )?;
    }

    if current_version < 3 {
        tracing::info!("Running migration v3: soft-delete columns for retention");
        add_column_if_not_exists(conn, "observations", "deleted_at_epoch", "INTEGER")?;
        add_column_if_not_exists(conn, "session_summaries", "deleted_at_epoch", "INTEGER")?;
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tracing::info!("Database schema up to date (version {})", SCHEMA_VERSION);

    Ok(())
}
