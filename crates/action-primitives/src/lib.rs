//! Action primitives for driving the battle game UI
//!
//! This crate provides the building blocks the scenario runner composes:
//! - Scene waits on the game's `active` scene markers
//! - Fetch-fresh, use-once dispatch of clicks and selections
//! - Condition polling with backoff in place of fixed sleeps

pub mod dispatch;
pub mod errors;
pub mod poll;
pub mod scene;

pub use dispatch::*;
pub use errors::*;
pub use poll::*;
pub use scene::*;
