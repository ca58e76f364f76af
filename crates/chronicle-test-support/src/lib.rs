//! Shared test mocks and utilities for the Chronicle event store.

mod clock;
mod config;
mod listener;
mod repository;

pub use clock::{FixedClock, ManualClock};
pub use config::StaticConfig;
pub use listener::{FailingListener, RecordingListener};
pub use repository::{EmptyEventRepository, FailingEventRepository, RecordingEventRepository};
