//! Reloved shopping-cart synchronization engine.
//!
//! Reconciles a shopping cart kept in durable local storage (available
//! before login, survives reloads) with the authoritative server-side cart
//! keyed by the logged-in identity, under an optimistic-update discipline
//! with exact-snapshot rollback.
//!
//! # Architecture
//!
//! - [`store`] - durable key/value persistence for one cart snapshot,
//!   synchronous, tolerant of corruption
//! - [`gateway`] - the authoritative per-identity cart API
//!   (fetch/add/update/remove) plus the HTTP implementation
//! - [`identity`] - credential/token resolution for the current actor
//! - [`machine`] - optimistic add/update/remove mutations with rollback on
//!   remote failure
//! - [`sync`] - the one-time local/remote reconciliation on the login
//!   transition
//!
//! Reconciliation policy is "last reconciliation wins, server authoritative
//! when non-empty" - this is not a CRDT merge.
//!
//! # Example
//!
//! ```rust,ignore
//! use reloved_cart_sync::{
//!     CartStateMachine, FileCartStore, GatewayConfig, HttpCartGateway, SyncCoordinator,
//! };
//!
//! let config = GatewayConfig::from_env()?;
//! let store = FileCartStore::new(data_dir, &resolver.storage_namespace());
//! let gateway = HttpCartGateway::new(&config, resolver.clone());
//! let machine = CartStateMachine::new(gateway, store, resolver);
//! let mut cart = SyncCoordinator::new(machine);
//!
//! // On the guest -> authenticated transition:
//! cart.handle_login().await?;
//!
//! // Mutations are optimistic and write through once authenticated:
//! cart.machine().add_line(draft).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod dto;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod machine;
pub mod store;
pub mod sync;

pub use cart::{Cart, CartLine, LineDisplay, LineDraft, LineKey};
pub use config::{ConfigError, GatewayConfig};
pub use error::{CartError, Result};
pub use gateway::{GatewayError, HttpCartGateway, RemoteCartGateway};
pub use identity::{Guest, Identity, IdentityKeyResolver};
pub use machine::CartStateMachine;
pub use store::{CartStore, FileCartStore, MemoryCartStore};
pub use sync::{SessionContext, SyncCoordinator, SyncState};
