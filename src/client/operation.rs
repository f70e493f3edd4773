//! Typed remote operations.
//!
//! Each request type names the remote command it maps to and renders its
//! own arguments, so adapters never build argument lists by hand.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::OperationArgs;

/// A request bound to one remote operation.
pub trait Operation {
    /// Domain (module) on the remote side.
    const DOMAIN: &'static str;

    /// Operation name within the domain.
    const OPERATION: &'static str;

    /// Render the request into positional and keyed arguments.
    fn args(&self) -> OperationArgs;
}

/// A read-only operation with a typed response.
pub trait QueryOperation: Operation {
    /// Shape of the decoded payload.
    type Response: DeserializeOwned + Serialize;

    /// The value a playbook can capture from the response.
    fn primary(_response: &Self::Response) -> Option<String> {
        None
    }
}

/// A state-mutating operation, signed by a keyring entry.
pub trait TxOperation: Operation {
    /// Key name or address that signs the transaction.
    fn signer(&self) -> &str;
}
