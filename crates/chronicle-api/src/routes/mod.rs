//! HTTP routes.

pub mod admin;
pub mod aggregates;
pub mod health;
