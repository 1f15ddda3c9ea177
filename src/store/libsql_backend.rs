//! libSQL backend: async `BattleStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::battle::{Battle, BattleStatus, BattleWithVerses, NewBattle, NewVerse, Verse, VerseUpdate};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::BattleStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn list_verses(&self, battle_id: Uuid) -> Result<Vec<Verse>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {VERSE_COLUMNS} FROM verses WHERE battle_id = ?1 ORDER BY position ASC"
                ),
                params![battle_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_verses: {e}")))?;

        let mut verses = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_verses row: {e}")))?
        {
            verses.push(row_to_verse(&row)?);
        }
        Ok(verses)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str, column: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s)
        .map_err(|e| DatabaseError::Serialization(format!("bad uuid in {column}: {e}")))
}

/// Map a libsql Row to a Battle.
///
/// Column order matches BATTLE_COLUMNS.
fn row_to_battle(row: &libsql::Row) -> Result<Battle, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("battle row parse: {e}"));

    let id_str: String = row.get(0).map_err(read)?;
    let status_str: String = row.get(5).map_err(read)?;
    let created_str: String = row.get(7).map_err(read)?;
    let updated_str: String = row.get(8).map_err(read)?;

    Ok(Battle {
        id: parse_uuid(&id_str, "battles.id")?,
        ai_one: row.get(1).map_err(read)?,
        ai_two: row.get(2).map_err(read)?,
        total_rounds: row.get::<i64>(3).map_err(read)? as u32,
        current_round: row.get::<i64>(4).map_err(read)? as u32,
        status: status_str
            .parse()
            .map_err(DatabaseError::Serialization)?,
        winner: row.get(6).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a Verse.
///
/// Column order matches VERSE_COLUMNS.
fn row_to_verse(row: &libsql::Row) -> Result<Verse, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("verse row parse: {e}"));

    let id_str: String = row.get(0).map_err(read)?;
    let battle_str: String = row.get(1).map_err(read)?;
    let created_str: String = row.get(10).map_err(read)?;
    let updated_str: String = row.get(11).map_err(read)?;

    Ok(Verse {
        id: parse_uuid(&id_str, "verses.id")?,
        battle_id: parse_uuid(&battle_str, "verses.battle_id")?,
        position: row.get::<i64>(2).map_err(read)? as u32,
        author: row.get(3).map_err(read)?,
        lyrics: row.get(4).map_err(read)?,
        remote_task_id: row.get(5).ok(),
        remote_status: row.get(6).ok(),
        audio_url: row.get(7).ok(),
        duration_ms: row.get::<i64>(8).ok().map(|d| d as u64),
        timing_json: row.get(9).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

// ── Trait implementation ────────────────────────────────────────────

const BATTLE_COLUMNS: &str =
    "id, ai_one, ai_two, total_rounds, current_round, status, winner, created_at, updated_at";

const VERSE_COLUMNS: &str = "id, battle_id, position, author, lyrics, remote_task_id, remote_status, audio_url, duration_ms, timing_json, created_at, updated_at";

#[async_trait]
impl BattleStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Battles ─────────────────────────────────────────────────────

    async fn create_battle(&self, battle: &NewBattle) -> Result<Battle, DatabaseError> {
        let now = Utc::now();
        let created = Battle {
            id: Uuid::new_v4(),
            ai_one: battle.ai_one.trim().to_string(),
            ai_two: battle.ai_two.trim().to_string(),
            total_rounds: battle.total_rounds,
            current_round: 0,
            status: BattleStatus::Pending,
            winner: None,
            created_at: now,
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO battles (id, ai_one, ai_two, total_rounds, current_round, status, winner, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, 0, ?5, NULL, ?6, ?7)",
                params![
                    created.id.to_string(),
                    created.ai_one.clone(),
                    created.ai_two.clone(),
                    created.total_rounds as i64,
                    created.status.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_battle: {e}")))?;

        debug!(battle_id = %created.id, "Battle inserted into DB");
        Ok(created)
    }

    async fn get_battle(&self, id: Uuid) -> Result<Option<Battle>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {BATTLE_COLUMNS} FROM battles WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_battle: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_battle(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_battle: {e}"))),
        }
    }

    async fn get_battle_with_verses(
        &self,
        id: Uuid,
    ) -> Result<Option<BattleWithVerses>, DatabaseError> {
        let Some(battle) = self.get_battle(id).await? else {
            return Ok(None);
        };
        let verses = self.list_verses(id).await?;
        Ok(Some(BattleWithVerses { battle, verses }))
    }

    async fn update_battle_status(
        &self,
        id: Uuid,
        status: BattleStatus,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE battles SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_battle_status: {e}")))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "battle".into(),
                id: id.to_string(),
            });
        }
        debug!(battle_id = %id, status = %status, "Battle status updated in DB");
        Ok(())
    }

    async fn update_battle_current_round(
        &self,
        id: Uuid,
        round: u32,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE battles SET current_round = ?1, updated_at = ?2 WHERE id = ?3",
                params![round as i64, now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_battle_current_round: {e}")))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "battle".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_battle_winner(&self, id: Uuid, winner: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE battles SET winner = ?1, updated_at = ?2 WHERE id = ?3",
                params![winner, now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_battle_winner: {e}")))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "battle".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_battles_by_status(
        &self,
        status: BattleStatus,
    ) -> Result<Vec<Battle>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {BATTLE_COLUMNS} FROM battles WHERE status = ?1 ORDER BY created_at ASC"
                ),
                params![status.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_battles_by_status: {e}")))?;

        let mut battles = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_battles_by_status row: {e}")))?
        {
            battles.push(row_to_battle(&row)?);
        }
        Ok(battles)
    }

    // ── Verses ──────────────────────────────────────────────────────

    async fn create_verse(&self, verse: &NewVerse) -> Result<Verse, DatabaseError> {
        let now = Utc::now();
        let created = Verse {
            id: Uuid::new_v4(),
            battle_id: verse.battle_id,
            position: verse.position,
            author: verse.author.clone(),
            lyrics: verse.lyrics.clone(),
            remote_task_id: None,
            remote_status: None,
            audio_url: None,
            duration_ms: None,
            timing_json: None,
            created_at: now,
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO verses (id, battle_id, position, author, lyrics, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    created.id.to_string(),
                    created.battle_id.to_string(),
                    created.position as i64,
                    created.author.clone(),
                    created.lyrics.clone(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE constraint failed") {
                    DatabaseError::Constraint(format!(
                        "battle {} already has a verse at position {}",
                        verse.battle_id, verse.position
                    ))
                } else {
                    DatabaseError::Query(format!("create_verse: {msg}"))
                }
            })?;

        debug!(verse_id = %created.id, position = created.position, "Verse inserted into DB");
        Ok(created)
    }

    async fn update_verse(&self, id: Uuid, update: &VerseUpdate) -> Result<Verse, DatabaseError> {
        let existing = self.get_verse(id).await?.ok_or_else(|| DatabaseError::NotFound {
            entity: "verse".into(),
            id: id.to_string(),
        })?;

        if let (Some(current), Some(requested)) =
            (&existing.remote_task_id, &update.remote_task_id)
        {
            if current != requested {
                return Err(DatabaseError::Constraint(format!(
                    "verse {id} already bound to remote task {current}"
                )));
            }
        }

        let now = Utc::now().to_rfc3339();
        let duration: libsql::Value = match update.duration_ms {
            Some(d) => libsql::Value::Integer(d as i64),
            None => libsql::Value::Null,
        };

        self.conn()
            .execute(
                "UPDATE verses SET remote_task_id = COALESCE(remote_task_id, ?1), remote_status = COALESCE(?2, remote_status), audio_url = COALESCE(?3, audio_url), duration_ms = COALESCE(?4, duration_ms), timing_json = COALESCE(?5, timing_json), updated_at = ?6 WHERE id = ?7",
                params![
                    opt_text(update.remote_task_id.as_deref()),
                    opt_text(update.remote_status.as_deref()),
                    opt_text(update.audio_url.as_deref()),
                    duration,
                    opt_text(update.timing_json.as_deref()),
                    now,
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_verse: {e}")))?;

        self.get_verse(id).await?.ok_or_else(|| DatabaseError::NotFound {
            entity: "verse".into(),
            id: id.to_string(),
        })
    }

    async fn get_verse(&self, id: Uuid) -> Result<Option<Verse>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {VERSE_COLUMNS} FROM verses WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_verse: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_verse(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_verse: {e}"))),
        }
    }
}
