use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The five append-only tables shared by both portals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    MoodLogs,
    DailyQuotes,
    Memories,
    SecureMessages,
    Interactions,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::MoodLogs,
        Table::DailyQuotes,
        Table::Memories,
        Table::SecureMessages,
        Table::Interactions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoodLogs => "mood_logs",
            Self::DailyQuotes => "daily_quotes",
            Self::Memories => "memories",
            Self::SecureMessages => "secure_messages",
            Self::Interactions => "interactions",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

/// A tag string that matches none of the known variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTag(pub String);

impl fmt::Display for UnknownTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tag '{}'", self.0)
    }
}

impl std::error::Error for UnknownTag {}

// -- Portals --

/// One of the two fixed identities admitted by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    Girlfriend,
    Boyfriend,
}

impl Portal {
    pub const ALL: [Portal; 2] = [Portal::Girlfriend, Portal::Boyfriend];

    pub fn peer(&self) -> Portal {
        match self {
            Self::Girlfriend => Self::Boyfriend,
            Self::Boyfriend => Self::Girlfriend,
        }
    }

    /// The ping kind this portal publishes.
    pub fn outgoing_ping(&self) -> InteractionKind {
        match self {
            Self::Girlfriend => InteractionKind::GirlfriendPing,
            Self::Boyfriend => InteractionKind::BoyfriendPing,
        }
    }

    /// The ping kind this portal alarms on.
    pub fn incoming_ping(&self) -> InteractionKind {
        self.peer().outgoing_ping()
    }

    /// Sender label written alongside this portal's interaction rows.
    pub fn sender_label(&self) -> &'static str {
        match self {
            Self::Girlfriend => "GIRLFRIEND_PORTAL",
            Self::Boyfriend => "SYS_ADMIN",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Girlfriend => "girlfriend",
            Self::Boyfriend => "boyfriend",
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Moods --

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoodId {
    #[default]
    #[serde(rename = "OPTIMAL")]
    Optimal,
    #[serde(rename = "ANXIOUS")]
    Anxious,
    #[serde(rename = "LOW POWER")]
    LowPower,
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(rename = "MISSING_ADMIN")]
    MissingAdmin,
}

impl MoodId {
    pub const ALL: [MoodId; 5] = [
        MoodId::Optimal,
        MoodId::Anxious,
        MoodId::LowPower,
        MoodId::Critical,
        MoodId::MissingAdmin,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Optimal => "OPTIMAL",
            Self::Anxious => "ANXIOUS",
            Self::LowPower => "LOW POWER",
            Self::Critical => "CRITICAL",
            Self::MissingAdmin => "MISSING_ADMIN",
        }
    }

    /// Accent color the dashboard switches to while this mood is current.
    pub fn accent(&self) -> &'static str {
        match self {
            Self::Optimal => "#10b981",
            Self::Anxious => "#f59e0b",
            Self::LowPower => "#6366f1",
            Self::Critical => "#ef4444",
            Self::MissingAdmin => "#ec4899",
        }
    }

    pub fn status_message(&self) -> &'static str {
        match self {
            Self::Optimal => "All systems nominal.",
            Self::Anxious => "Running background defrag. Be gentle.",
            Self::LowPower => "Battery depleted. Commencing rest cycle.",
            Self::Critical => "Core overheat. Immediate hugs required.",
            Self::MissingAdmin => "Searching for Boyfriend... connection lost.",
        }
    }
}

impl fmt::Display for MoodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MoodId {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.label() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

// -- Interactions --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    #[serde(rename = "GIRLFRIEND_PING")]
    GirlfriendPing,
    #[serde(rename = "BOYFRIEND_PING")]
    BoyfriendPing,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GirlfriendPing => "GIRLFRIEND_PING",
            Self::BoyfriendPing => "BOYFRIEND_PING",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GIRLFRIEND_PING" => Ok(Self::GirlfriendPing),
            "BOYFRIEND_PING" => Ok(Self::BoyfriendPing),
            other => Err(UnknownTag(other.to_string())),
        }
    }
}

// -- Rows --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodLog {
    pub seq: i64,
    pub mood_id: MoodId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub seq: i64,
    pub quote_text: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    pub seq: i64,
    pub id: String,
    pub image_url: String,
    pub caption: String,
    pub memory_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// The server stores the plaintext; obfuscation happens at display time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureMessage {
    pub seq: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub seq: i64,
    pub interaction_type: InteractionKind,
    pub sender: String,
    pub created_at: DateTime<Utc>,
}

/// A stored row of any table, as delivered by selects and insert notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
pub enum Row {
    MoodLogs(MoodLog),
    DailyQuotes(Quote),
    Memories(Memory),
    SecureMessages(SecureMessage),
    Interactions(Interaction),
}

impl Row {
    pub fn table(&self) -> Table {
        match self {
            Self::MoodLogs(_) => Table::MoodLogs,
            Self::DailyQuotes(_) => Table::DailyQuotes,
            Self::Memories(_) => Table::Memories,
            Self::SecureMessages(_) => Table::SecureMessages,
            Self::Interactions(_) => Table::Interactions,
        }
    }

    /// Per-table insertion order assigned by the store.
    pub fn seq(&self) -> i64 {
        match self {
            Self::MoodLogs(r) => r.seq,
            Self::DailyQuotes(r) => r.seq,
            Self::Memories(r) => r.seq,
            Self::SecureMessages(r) => r.seq,
            Self::Interactions(r) => r.seq,
        }
    }
}

/// A row to append. The store assigns `seq`, `created_at` and (for memories) `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum NewRow {
    MoodLogs {
        mood_id: MoodId,
    },
    DailyQuotes {
        quote_text: String,
        author: String,
    },
    Memories {
        image_url: String,
        caption: String,
        memory_date: NaiveDate,
    },
    SecureMessages {
        message: String,
    },
    Interactions {
        interaction_type: InteractionKind,
        sender: String,
    },
}

impl NewRow {
    pub fn table(&self) -> Table {
        match self {
            Self::MoodLogs { .. } => Table::MoodLogs,
            Self::DailyQuotes { .. } => Table::DailyQuotes,
            Self::Memories { .. } => Table::Memories,
            Self::SecureMessages { .. } => Table::SecureMessages,
            Self::Interactions { .. } => Table::Interactions,
        }
    }

    /// The row a store produces for this insert. Memories get a fresh v4 id.
    pub fn into_stored(self, seq: i64, created_at: DateTime<Utc>) -> Row {
        match self {
            Self::MoodLogs { mood_id } => Row::MoodLogs(MoodLog {
                seq,
                mood_id,
                created_at,
            }),
            Self::DailyQuotes { quote_text, author } => Row::DailyQuotes(Quote {
                seq,
                quote_text,
                author,
                created_at,
            }),
            Self::Memories {
                image_url,
                caption,
                memory_date,
            } => Row::Memories(Memory {
                seq,
                id: uuid::Uuid::new_v4().to_string(),
                image_url,
                caption,
                memory_date,
                created_at,
            }),
            Self::SecureMessages { message } => Row::SecureMessages(SecureMessage {
                seq,
                message,
                created_at,
            }),
            Self::Interactions {
                interaction_type,
                sender,
            } => Row::Interactions(Interaction {
                seq,
                interaction_type,
                sender,
                created_at,
            }),
        }
    }
}

/// Typed view over one table's rows.
pub trait Record: Clone + Send + Sync + 'static {
    const TABLE: Table;

    fn seq(&self) -> i64;

    fn from_row(row: Row) -> Option<Self>;
}

macro_rules! impl_record {
    ($ty:ty, $variant:ident) => {
        impl Record for $ty {
            const TABLE: Table = Table::$variant;

            fn seq(&self) -> i64 {
                self.seq
            }

            fn from_row(row: Row) -> Option<Self> {
                match row {
                    Row::$variant(r) => Some(r),
                    _ => None,
                }
            }
        }
    };
}

impl_record!(MoodLog, MoodLogs);
impl_record!(Quote, DailyQuotes);
impl_record!(Memory, Memories);
impl_record!(SecureMessage, SecureMessages);
impl_record!(Interaction, Interactions);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_labels_match_wire_tags() {
        for mood in MoodId::ALL {
            let json = serde_json::to_string(&mood).unwrap();
            assert_eq!(json, format!("\"{}\"", mood.label()));
            assert_eq!(mood.label().parse::<MoodId>().unwrap(), mood);
        }
        assert!("SLEEPY".parse::<MoodId>().is_err());
    }

    #[test]
    fn portals_alarm_on_each_others_pings() {
        assert_eq!(Portal::Girlfriend.incoming_ping(), InteractionKind::BoyfriendPing);
        assert_eq!(Portal::Boyfriend.incoming_ping(), InteractionKind::GirlfriendPing);
        for portal in Portal::ALL {
            assert_ne!(portal.outgoing_ping(), portal.incoming_ping());
        }
    }

    #[test]
    fn row_is_tagged_by_table() {
        let row = Row::SecureMessages(SecureMessage {
            seq: 3,
            message: "hi".into(),
            created_at: Utc::now(),
        });
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["table"], "secure_messages");
        assert_eq!(value["row"]["seq"], 3);
        assert_eq!(row.table(), Table::SecureMessages);
    }

    #[test]
    fn new_row_uses_flat_table_tag() {
        let json = r#"{"table":"interactions","interaction_type":"GIRLFRIEND_PING","sender":"x"}"#;
        let row: NewRow = serde_json::from_str(json).unwrap();
        assert_eq!(
            row,
            NewRow::Interactions {
                interaction_type: InteractionKind::GirlfriendPing,
                sender: "x".into(),
            }
        );
        assert_eq!(row.table(), Table::Interactions);
    }

    #[test]
    fn record_from_row_rejects_other_tables() {
        let row = Row::MoodLogs(MoodLog {
            seq: 1,
            mood_id: MoodId::Critical,
            created_at: Utc::now(),
        });
        assert!(Quote::from_row(row.clone()).is_none());
        assert_eq!(MoodLog::from_row(row).unwrap().mood_id, MoodId::Critical);
    }

    #[test]
    fn table_round_trips_through_str() {
        for table in Table::ALL {
            assert_eq!(table.as_str().parse::<Table>().unwrap(), table);
        }
    }
}
