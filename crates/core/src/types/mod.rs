//! Core types for Reloved.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod condition;
pub mod id;
pub mod role;

pub use condition::Condition;
pub use id::*;
pub use role::ActorRole;
