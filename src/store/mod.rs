//! Persistence layer: libSQL-backed storage for battles and verses.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::BattleStore;
