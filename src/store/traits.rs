//! `BattleStore` trait: single async interface for battle persistence.
//!
//! Every call is atomic and durable on return, so intermediate writes made
//! by a running job are visible to other readers immediately.

use async_trait::async_trait;
use uuid::Uuid;

use crate::battle::{Battle, BattleStatus, BattleWithVerses, NewBattle, NewVerse, Verse, VerseUpdate};
use crate::error::DatabaseError;

/// Backend-agnostic store for battles and their verses.
#[async_trait]
pub trait BattleStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Battles ─────────────────────────────────────────────────────

    /// Insert a new battle in `pending` status.
    async fn create_battle(&self, battle: &NewBattle) -> Result<Battle, DatabaseError>;

    async fn get_battle(&self, id: Uuid) -> Result<Option<Battle>, DatabaseError>;

    /// Battle plus its verses, ordered by ascending position.
    async fn get_battle_with_verses(
        &self,
        id: Uuid,
    ) -> Result<Option<BattleWithVerses>, DatabaseError>;

    async fn update_battle_status(
        &self,
        id: Uuid,
        status: BattleStatus,
    ) -> Result<(), DatabaseError>;

    async fn update_battle_current_round(&self, id: Uuid, round: u32)
    -> Result<(), DatabaseError>;

    async fn set_battle_winner(&self, id: Uuid, winner: &str) -> Result<(), DatabaseError>;

    /// All battles in the given status, oldest first.
    async fn list_battles_by_status(
        &self,
        status: BattleStatus,
    ) -> Result<Vec<Battle>, DatabaseError>;

    // ── Verses ──────────────────────────────────────────────────────

    /// Insert a verse. Fails with `Constraint` if the position is taken.
    async fn create_verse(&self, verse: &NewVerse) -> Result<Verse, DatabaseError>;

    /// Apply a partial update. The remote task id may only go from absent
    /// to present; setting a different id on a verse that already has one
    /// fails with `Constraint`.
    async fn update_verse(&self, id: Uuid, update: &VerseUpdate) -> Result<Verse, DatabaseError>;

    async fn get_verse(&self, id: Uuid) -> Result<Option<Verse>, DatabaseError>;
}
