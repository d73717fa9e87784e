//! Durable local cart persistence.
//!
//! One serialized blob per storage namespace, written synchronously after
//! every accepted mutation (rollbacks included), so the durable state always
//! matches the in-memory snapshot. Persistence failures never escape the
//! engine: unreadable or unparseable content is discarded with a warning and
//! treated as an empty cart, and write failures are logged and swallowed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::cart::Cart;

/// Durable key/value persistence for one cart snapshot.
///
/// Implementations are synchronous and infallible from the caller's point of
/// view; the error-handling contract above is part of the trait.
pub trait CartStore: Send + Sync {
    /// The last persisted cart, or an empty cart if absent or unparseable.
    fn load(&self) -> Cart;

    /// Persist the snapshot. Failures are logged and swallowed.
    fn save(&self, cart: &Cart);
}

impl<T: CartStore + ?Sized> CartStore for std::sync::Arc<T> {
    fn load(&self) -> Cart {
        (**self).load()
    }

    fn save(&self, cart: &Cart) {
        (**self).save(cart);
    }
}

fn parse_blob(blob: &str, origin: &str) -> Cart {
    match serde_json::from_str(blob) {
        Ok(cart) => cart,
        Err(error) => {
            warn!(%origin, %error, "discarding unparseable cart blob");
            Cart::default()
        }
    }
}

// =============================================================================
// FileCartStore
// =============================================================================

/// File-backed store: one JSON blob at `<data_dir>/cart-<namespace>.json`.
#[derive(Debug, Clone)]
pub struct FileCartStore {
    path: PathBuf,
}

impl FileCartStore {
    /// Create a store for the given actor storage namespace.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("cart-{namespace}.json")),
        }
    }

    /// Path of the blob file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartStore for FileCartStore {
    fn load(&self) -> Cart {
        match fs::read_to_string(&self.path) {
            Ok(blob) => parse_blob(&blob, &self.path.display().to_string()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Cart::default(),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to read cart blob");
                Cart::default()
            }
        }
    }

    fn save(&self, cart: &Cart) {
        let blob = match serde_json::to_string(cart) {
            Ok(blob) => blob,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to serialize cart");
                return;
            }
        };
        if let Some(parent) = self.path.parent()
            && let Err(error) = fs::create_dir_all(parent)
        {
            warn!(path = %self.path.display(), %error, "failed to create cart data dir");
            return;
        }
        if let Err(error) = fs::write(&self.path, blob) {
            warn!(path = %self.path.display(), %error, "failed to write cart blob");
        }
    }
}

// =============================================================================
// MemoryCartStore
// =============================================================================

/// In-process store holding the serialized blob in a mutex slot.
///
/// Mirrors the file store's behavior (including corruption tolerance, which
/// tests exercise by injecting garbage blobs).
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    blob: Mutex<Option<String>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        match self.blob.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace the stored blob verbatim (corruption injection for tests).
    pub fn inject_blob(&self, blob: impl Into<String>) {
        *self.lock() = Some(blob.into());
    }

    /// The raw stored blob, if any.
    #[must_use]
    pub fn raw_blob(&self) -> Option<String> {
        self.lock().clone()
    }
}

impl CartStore for MemoryCartStore {
    fn load(&self) -> Cart {
        self.lock()
            .as_deref()
            .map_or_else(Cart::default, |blob| parse_blob(blob, "memory"))
    }

    fn save(&self, cart: &Cart) {
        match serde_json::to_string(cart) {
            Ok(blob) => *self.lock() = Some(blob),
            Err(error) => warn!(%error, "failed to serialize cart"),
        }
    }
}
