//! Battle Jobs: background generation of AI rap battles.

pub mod audio;
pub mod battle;
pub mod config;
pub mod error;
pub mod jobs;
pub mod lyrics;
pub mod store;
