use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS mood_logs (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            mood_id     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS daily_quotes (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            quote_text  TEXT NOT NULL,
            author      TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS memories (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            image_url   TEXT NOT NULL,
            caption     TEXT NOT NULL,
            memory_date TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memories_date
            ON memories(memory_date);

        CREATE TABLE IF NOT EXISTS secure_messages (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS interactions (
            seq              INTEGER PRIMARY KEY AUTOINCREMENT,
            interaction_type TEXT NOT NULL,
            sender           TEXT NOT NULL,
            created_at       TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
