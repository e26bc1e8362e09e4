//! Unified error type for Noughts.

use noughts_protocol::ProtocolError;
use noughts_room::RoomError;
use noughts_store::StoreError;
use noughts_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts layer errors without ceremony.
#[derive(Debug, thiserror::Error)]
pub enum NoughtsError {
    /// Bind, accept, send or receive failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room rejected an operation.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The persistence gateway failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
