// file: src/pipeline/mod.rs
// description: per-repository pipeline and both processing front-ends

pub mod dispatch;
pub mod orchestrator;
pub mod processor;
pub mod progress;

pub use dispatch::{DispatchLoop, DispatchState, Effect, Event, Phase};
pub use orchestrator::Orchestrator;
pub use processor::{Outcome, RepoProcessor, RepoResult};
pub use progress::{ProcessingStats, ProgressTracker};

#[cfg(test)]
pub(crate) mod testutil;
