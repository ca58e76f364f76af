//! Chronicle Core: shared abstractions for the aggregate event store.
//!
//! This crate defines the event model, the repository contract, the
//! serialization codec and the collaborator traits (clock, dynamic
//! configuration, commit listeners). It contains no infrastructure code.

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod listener;
pub mod pagination;
pub mod repository;
pub mod store;
