//! Error types for the persistence gateway.

use noughts_protocol::GameRef;

/// Errors a [`GameStore`](crate::GameStore) call can return.
///
/// None of these are fatal to a room. The caller logs them and records
/// the write in the [`ReconciliationLog`](crate::ReconciliationLog).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or timed out.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    /// The referenced game row does not exist.
    #[error("game {0} not found")]
    GameNotFound(GameRef),
}
