//! Error types for kea-fleet.

use thiserror::Error;

use crate::inventory::InventoryError;
use crate::response::ResponseError;
use crate::transport::TransportError;

/// Errors surfaced to callers of the lease engine.
///
/// Fleet queries tolerate per-app failures; only an inventory read
/// failure or invalid caller input aborts a whole query. Transport and
/// response errors appear here solely through the single-app getters,
/// which have no erred-apps bookkeeping to fold them into.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The fleet inventory could not be read. No partial results are
    /// possible in this case.
    #[error("failed to read the fleet inventory: {0}")]
    Inventory(#[from] InventoryError),

    /// A MAC-shaped search value could not be canonicalized; the
    /// request itself is unsatisfiable.
    #[error("invalid format of the value {0:?} used to get leases by MAC address")]
    InvalidIdentifier(String),

    /// Communication with one app failed (single-app getters only).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A daemon answered with an error or a malformed payload
    /// (single-app getters only).
    #[error(transparent)]
    Response(#[from] ResponseError),
}
