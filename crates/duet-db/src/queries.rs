use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use duet_types::{Interaction, Memory, MoodLog, NewRow, Quote, Record, Row, SecureMessage, Table};

use crate::Database;

impl Database {
    // -- Inserts --

    /// Append a row and return it as stored, with its assigned `seq` and `created_at`.
    pub fn insert(&self, new: &NewRow) -> Result<Row> {
        let (stamp, created_at) = now_stamp()?;

        self.with_conn(|conn| {
            let row = match new {
                NewRow::MoodLogs { mood_id } => {
                    conn.execute(
                        "INSERT INTO mood_logs (mood_id, created_at) VALUES (?1, ?2)",
                        (mood_id.label(), &stamp),
                    )?;
                    Row::MoodLogs(MoodLog {
                        seq: conn.last_insert_rowid(),
                        mood_id: *mood_id,
                        created_at,
                    })
                }
                NewRow::DailyQuotes { quote_text, author } => {
                    conn.execute(
                        "INSERT INTO daily_quotes (quote_text, author, created_at) VALUES (?1, ?2, ?3)",
                        (quote_text, author, &stamp),
                    )?;
                    Row::DailyQuotes(Quote {
                        seq: conn.last_insert_rowid(),
                        quote_text: quote_text.clone(),
                        author: author.clone(),
                        created_at,
                    })
                }
                NewRow::Memories {
                    image_url,
                    caption,
                    memory_date,
                } => {
                    let id = Uuid::new_v4().to_string();
                    conn.execute(
                        "INSERT INTO memories (id, image_url, caption, memory_date, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![id, image_url, caption, memory_date.to_string(), stamp],
                    )?;
                    Row::Memories(Memory {
                        seq: conn.last_insert_rowid(),
                        id,
                        image_url: image_url.clone(),
                        caption: caption.clone(),
                        memory_date: *memory_date,
                        created_at,
                    })
                }
                NewRow::SecureMessages { message } => {
                    conn.execute(
                        "INSERT INTO secure_messages (message, created_at) VALUES (?1, ?2)",
                        (message, &stamp),
                    )?;
                    Row::SecureMessages(SecureMessage {
                        seq: conn.last_insert_rowid(),
                        message: message.clone(),
                        created_at,
                    })
                }
                NewRow::Interactions {
                    interaction_type,
                    sender,
                } => {
                    conn.execute(
                        "INSERT INTO interactions (interaction_type, sender, created_at) VALUES (?1, ?2, ?3)",
                        (interaction_type.as_str(), sender, &stamp),
                    )?;
                    Row::Interactions(Interaction {
                        seq: conn.last_insert_rowid(),
                        interaction_type: *interaction_type,
                        sender: sender.clone(),
                        created_at,
                    })
                }
            };
            Ok(row)
        })
    }

    // -- Selects --

    /// The `limit` most recent rows of a table, newest first.
    /// Memories are ordered by `memory_date` instead of insertion time.
    pub fn select(&self, table: Table, limit: u32) -> Result<Vec<Row>> {
        self.with_conn(|conn| match table {
            Table::MoodLogs => collect(
                conn,
                "SELECT seq, mood_id, created_at FROM mood_logs
                 ORDER BY created_at DESC, seq DESC LIMIT ?1",
                limit,
                mood_row,
                Row::MoodLogs,
            ),
            Table::DailyQuotes => collect(
                conn,
                "SELECT seq, quote_text, author, created_at FROM daily_quotes
                 ORDER BY created_at DESC, seq DESC LIMIT ?1",
                limit,
                quote_row,
                Row::DailyQuotes,
            ),
            Table::Memories => collect(
                conn,
                "SELECT seq, id, image_url, caption, memory_date, created_at FROM memories
                 ORDER BY memory_date DESC, seq DESC LIMIT ?1",
                limit,
                memory_row,
                Row::Memories,
            ),
            Table::SecureMessages => collect(
                conn,
                "SELECT seq, message, created_at FROM secure_messages
                 ORDER BY created_at DESC, seq DESC LIMIT ?1",
                limit,
                secure_message_row,
                Row::SecureMessages,
            ),
            Table::Interactions => collect(
                conn,
                "SELECT seq, interaction_type, sender, created_at FROM interactions
                 ORDER BY created_at DESC, seq DESC LIMIT ?1",
                limit,
                interaction_row,
                Row::Interactions,
            ),
        })
    }

    /// Current value of a single-row-latest table.
    pub fn latest<T: Record>(&self) -> Result<Option<T>> {
        Ok(self
            .select(T::TABLE, 1)?
            .into_iter()
            .next()
            .and_then(T::from_row))
    }

    pub fn recent_memories(&self, limit: u32) -> Result<Vec<Memory>> {
        Ok(self
            .select(Table::Memories, limit)?
            .into_iter()
            .filter_map(Memory::from_row)
            .collect())
    }
}

/// Fixed-width UTC timestamp so that text ordering matches time ordering.
fn now_stamp() -> Result<(String, DateTime<Utc>)> {
    let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    let parsed = DateTime::parse_from_rfc3339(&stamp)?.with_timezone(&Utc);
    Ok((stamp, parsed))
}

fn collect<T>(
    conn: &Connection,
    sql: &str,
    limit: u32,
    map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    wrap: fn(T) -> Row,
) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([limit], map)?
        .map(|r| r.map(wrap))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn mood_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MoodLog> {
    Ok(MoodLog {
        seq: row.get(0)?,
        mood_id: parse_col(row, 1)?,
        created_at: timestamp_col(row, 2)?,
    })
}

fn quote_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Quote> {
    Ok(Quote {
        seq: row.get(0)?,
        quote_text: row.get(1)?,
        author: row.get(2)?,
        created_at: timestamp_col(row, 3)?,
    })
}

fn memory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    Ok(Memory {
        seq: row.get(0)?,
        id: row.get(1)?,
        image_url: row.get(2)?,
        caption: row.get(3)?,
        memory_date: parse_col(row, 4)?,
        created_at: timestamp_col(row, 5)?,
    })
}

fn secure_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SecureMessage> {
    Ok(SecureMessage {
        seq: row.get(0)?,
        message: row.get(1)?,
        created_at: timestamp_col(row, 2)?,
    })
}

fn interaction_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Interaction> {
    Ok(Interaction {
        seq: row.get(0)?,
        interaction_type: parse_col(row, 1)?,
        sender: row.get(2)?,
        created_at: timestamp_col(row, 3)?,
    })
}

fn parse_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn timestamp_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
