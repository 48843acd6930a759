// file: src/lib.rs
// description: library entry point and public api exports
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod repository;
pub mod utils;

pub use config::{Config, Operation};
pub use error::{HerdError, Result};
pub use pipeline::{
    DispatchLoop, DispatchState, Effect, Event, Orchestrator, Outcome, Phase, ProcessingStats,
    ProgressTracker, RepoProcessor, RepoResult,
};
pub use repository::{DETACHED, Git2Backend, GitBackend, RepoEntry, RepoScanner, RepoStatus};
