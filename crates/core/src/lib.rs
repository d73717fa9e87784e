//! Reloved Core - Shared types library.
//!
//! This crate provides common types used across all Reloved components:
//! - `cart-sync` - Shopping-cart synchronization engine
//! - the role dashboards (customer, partner, agent, admin) that embed it
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, actor roles, and the
//!   normalized condition variant selector

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
