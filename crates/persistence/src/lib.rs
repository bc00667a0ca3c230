#![deny(warnings)]

//! Persistence layer: SQLite schema and the store implementations the
//! expansion engine runs against.
//!
//! Rules are kept as JSON bodies keyed by id so new rule fields need no
//! schema change. Quests are plain columns; a unique index on
//! `(source_rule, due_date)` backs the one-quest-per-rule-per-day guarantee.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use expansion::{QuestStore, RuleStore, StoreError};
use quest_core::{validate_new_quest, NewQuest, Quest, QuestId, QuestRank, QuestStatus, Rule, RuleId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS recurring_rules (
        id TEXT PRIMARY KEY,
        body TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS quests (
        id TEXT PRIMARY KEY,
        quest_name TEXT NOT NULL,
        quest_rank TEXT NOT NULL,
        due_date TEXT NOT NULL,
        due_time TEXT,
        duration_minutes INTEGER,
        status TEXT NOT NULL,
        source_rule TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS quests_rule_due
        ON quests (source_rule, due_date)",
    "CREATE INDEX IF NOT EXISTS quests_due ON quests (due_date)",
];

/// Returns the default SQLite URL used for the local quest log.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./data/quests.db"
}

/// Create the parent directory of a file-backed SQLite URL.
pub fn ensure_parent_dir(url: &str) -> std::io::Result<()> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"));
    match path {
        Some(path) if !path.starts_with(":memory:") => {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Open (creating if missing) the database at `url` and apply the schema.
pub async fn init_db(url: &str) -> Result<SqlitePool, sqlx::Error> {
    ensure_parent_dir(url).map_err(sqlx::Error::Io)?;
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    // Every in-memory connection is its own database.
    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    info!(url, "database ready");
    Ok(pool)
}

/// Rule and quest store over one SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self::new(init_db(url).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All quests ordered by due date.
    pub async fn list_quests(&self) -> Result<Vec<Quest>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, quest_name, quest_rank, due_date, due_time, duration_minutes, status, source_rule
             FROM quests ORDER BY due_date, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::unavailable)?;
        rows.iter().map(quest_from_row).collect()
    }
}

fn decode_rule(body: &str) -> Result<Rule, StoreError> {
    serde_json::from_str(body).map_err(StoreError::corrupt)
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| StoreError::corrupt(format!("bad date {raw:?}: {e}")))
}

fn quest_from_row(row: &SqliteRow) -> Result<Quest, StoreError> {
    let get_text = |col: &str| -> Result<String, StoreError> {
        row.try_get::<String, _>(col).map_err(StoreError::corrupt)
    };
    let due_time = row
        .try_get::<Option<String>, _>("due_time")
        .map_err(StoreError::corrupt)?
        .map(|raw| {
            NaiveTime::parse_from_str(&raw, TIME_FORMAT)
                .map_err(|e| StoreError::corrupt(format!("bad time {raw:?}: {e}")))
        })
        .transpose()?;
    let duration_minutes = row
        .try_get::<Option<i64>, _>("duration_minutes")
        .map_err(StoreError::corrupt)?
        .map(|m| u32::try_from(m).map_err(StoreError::corrupt))
        .transpose()?;
    let source_rule = row
        .try_get::<Option<String>, _>("source_rule")
        .map_err(StoreError::corrupt)?
        .map(RuleId);
    Ok(Quest {
        id: QuestId(get_text("id")?),
        quest_name: get_text("quest_name")?,
        quest_rank: get_text("quest_rank")?
            .parse::<QuestRank>()
            .map_err(StoreError::corrupt)?,
        due_date: parse_date(&get_text("due_date")?)?,
        due_time,
        duration_minutes,
        status: get_text("status")?
            .parse::<QuestStatus>()
            .map_err(StoreError::corrupt)?,
        source_rule,
    })
}

#[async_trait]
impl RuleStore for SqliteStore {
    async fn list_active_rules(&self) -> Result<Vec<Rule>, StoreError> {
        let rows = sqlx::query("SELECT id, body FROM recurring_rules ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::unavailable)?;
        let mut rules = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(StoreError::corrupt)?;
            let body: String = row.try_get("body").map_err(StoreError::corrupt)?;
            // One unreadable row must not hide the rest.
            match decode_rule(&body) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(rule_id = %id, error = %e, "skipping unreadable rule"),
            }
        }
        Ok(rules)
    }

    async fn get(&self, id: &RuleId) -> Result<Option<Rule>, StoreError> {
        let row = sqlx::query("SELECT body FROM recurring_rules WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::unavailable)?;
        match row {
            Some(row) => {
                let body: String = row.try_get("body").map_err(StoreError::corrupt)?;
                decode_rule(&body).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, rule: &Rule) -> Result<(), StoreError> {
        let body = serde_json::to_string(rule).map_err(StoreError::corrupt)?;
        sqlx::query(
            "INSERT INTO recurring_rules (id, body, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&rule.id.0)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(StoreError::unavailable)?;
        debug!(rule_id = %rule.id, "rule saved");
        Ok(())
    }

    async fn compare_and_save(&self, current: &Rule, next: &Rule) -> Result<bool, StoreError> {
        let body = serde_json::to_string(next).map_err(StoreError::corrupt)?;
        let mut tx = self.pool.begin().await.map_err(StoreError::unavailable)?;
        let row = sqlx::query("SELECT body FROM recurring_rules WHERE id = ?")
            .bind(&current.id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::unavailable)?;
        let Some(row) = row else {
            return Ok(false);
        };
        let stored: String = row.try_get("body").map_err(StoreError::corrupt)?;
        if decode_rule(&stored)? != *current {
            return Ok(false);
        }
        sqlx::query(
            "UPDATE recurring_rules SET body = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(body)
        .bind(&current.id.0)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::unavailable)?;
        tx.commit().await.map_err(StoreError::unavailable)?;
        debug!(rule_id = %current.id, "rule updated in place");
        Ok(true)
    }

    async fn delete(&self, id: &RuleId) -> Result<bool, StoreError> {
        let done = sqlx::query("DELETE FROM recurring_rules WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl QuestStore for SqliteStore {
    async fn exists_for(&self, rule_id: &RuleId, date: NaiveDate) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM quests WHERE source_rule = ? AND due_date = ?")
            .bind(&rule_id.0)
            .bind(date.format(DATE_FORMAT).to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::unavailable)?;
        let n: i64 = row.try_get("n").map_err(StoreError::corrupt)?;
        Ok(n > 0)
    }

    async fn create_quest(&self, quest: NewQuest) -> Result<QuestId, StoreError> {
        validate_new_quest(&quest)?;
        let id = QuestId::generate();
        let result = sqlx::query(
            "INSERT INTO quests (id, quest_name, quest_rank, due_date, due_time, duration_minutes, status, source_rule)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(&quest.quest_name)
        .bind(quest.quest_rank.to_string())
        .bind(quest.due_date.format(DATE_FORMAT).to_string())
        .bind(quest.due_time.map(|t| t.format(TIME_FORMAT).to_string()))
        .bind(quest.duration_minutes.map(i64::from))
        .bind(quest.status.label())
        .bind(quest.source_rule.as_ref().map(|r| r.0.clone()))
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(id),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                match quest.source_rule {
                    Some(rule_id) => Err(StoreError::Duplicate {
                        rule_id,
                        date: quest.due_date,
                    }),
                    None => Err(StoreError::unavailable(db)),
                }
            }
            Err(e) => Err(StoreError::unavailable(e)),
        }
    }

    async fn count_generated(&self, rule_id: &RuleId) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM quests WHERE source_rule = ?")
            .bind(&rule_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::unavailable)?;
        let n: i64 = row.try_get("n").map_err(StoreError::corrupt)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn delete_generated_from(
        &self,
        rule_id: &RuleId,
        from: NaiveDate,
    ) -> Result<u64, StoreError> {
        // ISO dates order lexically.
        let done = sqlx::query("DELETE FROM quests WHERE source_rule = ? AND due_date >= ?")
            .bind(&rule_id.0)
            .bind(from.format(DATE_FORMAT).to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(done.rows_affected())
    }
}
