//! Background battle generation.
//!
//! - `queue`: sequential in-process job queue
//! - `orchestrator`: runs a whole battle round by round
//! - `executor`: produces one verse (lyrics, audio, persistence)
//! - `worker`: `JobHandler` routing jobs to the two above

pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod queue;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::VerseExecutor;
pub use model::{Job, JobKind, VerseJob};
pub use orchestrator::BattleOrchestrator;
pub use queue::{JobHandler, JobQueue, QueueStats};
pub use worker::BattleWorker;
