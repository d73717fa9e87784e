//! Caller-facing error type for cart operations.
//!
//! Local persistence failures are deliberately absent: the store swallows
//! them (see [`crate::store`]), so the only errors that escape the engine
//! are caller mistakes and remote failures. No error here is fatal to the
//! hosting process; the worst case is a temporarily inconsistent cart.

use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors surfaced to the calling UI layer.
#[derive(Debug, Error)]
pub enum CartError {
    /// Caller error (nonexistent line, ambiguous variant, zero-quantity
    /// add). Fails fast; no network call was made.
    #[error("invalid cart operation: {0}")]
    Validation(String),

    /// Remote gateway failure. For update/remove/add the optimistic local
    /// mutation has already been rolled back to the exact prior snapshot.
    #[error("remote cart error: {0}")]
    Remote(#[from] GatewayError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::Validation("p1 is not in the cart".to_string());
        assert_eq!(err.to_string(), "invalid cart operation: p1 is not in the cart");

        let err = CartError::Remote(GatewayError::Unauthenticated);
        assert_eq!(err.to_string(), "remote cart error: not authenticated");
    }
}
