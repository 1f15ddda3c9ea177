//! Battle domain model: battles, verses, and turn-order rules.

pub mod model;

pub use model::{
    Battle, BattleStatus, BattleWithVerses, NewBattle, NewVerse, Verse, VerseUpdate,
    leader_for_round, verse_position,
};
